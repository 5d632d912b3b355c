use async_trait::async_trait;
use url::Url;

use super::{ConceptMap, ConceptMapSource};
use crate::core::TerminologyConfig;
use crate::error::{ConversionError, Result};

/// Reads ConceptMaps from a FHIR terminology store with `GET {base}/ConceptMap/{id}`.
///
/// Every failure is logged and reported as "not found".
#[derive(Debug, Clone)]
pub struct HttpConceptMapSource {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpConceptMapSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConversionError::Config {
            message: format!("invalid terminology base url {base_url}: {e}"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            auth_token: None,
        })
    }

    pub fn from_config(config: &TerminologyConfig) -> Result<Option<Self>> {
        let Some(base) = &config.base_url else {
            return Ok(None);
        };
        let mut source = Self::new(base)?;
        source.auth_token = config.auth_token.clone();
        Ok(Some(source))
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn concept_map_url(&self, id: &str) -> Option<Url> {
        self.base_url.join(&format!("ConceptMap/{id}")).ok()
    }
}

#[async_trait]
impl ConceptMapSource for HttpConceptMapSource {
    async fn fetch(&self, id: &str) -> Option<ConceptMap> {
        let url = self.concept_map_url(id)?;

        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/fhir+json");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("ConceptMap request to {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("ConceptMap/{} not found", id);
            return None;
        }
        if !status.is_success() {
            tracing::warn!("ConceptMap/{} returned HTTP {}", id, status);
            return None;
        }

        match response.json::<ConceptMap>().await {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!("ConceptMap/{} could not be decoded: {}", id, e);
                None
            }
        }
    }
}
