use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConversionError, Result};

/// Converter settings. Everything has a usable default, so a config file only needs the
/// values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Leading segment of every external mapping id:
    /// `{prefix}-{sending-application}-{sending-facility}-{mapping-type}`.
    pub mapping_id_prefix: String,
    /// Upper bound on order groups converted at the same time within one message.
    pub max_concurrent_groups: usize,
    pub terminology: TerminologyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminologyConfig {
    /// FHIR base of the terminology store holding sender ConceptMaps.
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            mapping_id_prefix: "hl7v2".to_string(),
            max_concurrent_groups: num_cpus::get().max(1),
            terminology: TerminologyConfig::default(),
        }
    }
}

impl ConverterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mapping_id_prefix.trim().is_empty() {
            return Err(ConversionError::Config {
                message: "mapping_id_prefix must not be empty".to_string(),
            });
        }
        if self.max_concurrent_groups == 0 {
            return Err(ConversionError::Config {
                message: "max_concurrent_groups must be at least 1".to_string(),
            });
        }
        if let Some(base) = &self.terminology.base_url {
            url::Url::parse(base).map_err(|e| ConversionError::Config {
                message: format!("invalid terminology base_url {base}: {e}"),
            })?;
        }
        Ok(())
    }

    pub fn with_mapping_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mapping_id_prefix = prefix.into();
        self
    }

    pub fn with_max_concurrent_groups(mut self, limit: usize) -> Self {
        self.max_concurrent_groups = limit.max(1);
        self
    }

    /// Convert groups one after another.
    pub fn sequential(self) -> Self {
        self.with_max_concurrent_groups(1)
    }

    pub fn with_terminology_url(mut self, base_url: impl Into<String>) -> Self {
        self.terminology.base_url = Some(base_url.into());
        self
    }

    pub fn with_terminology_token(mut self, token: impl Into<String>) -> Self {
        self.terminology.auth_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::default();
        assert_eq!(config.mapping_id_prefix, "hl7v2");
        assert!(config.max_concurrent_groups >= 1);
        assert!(config.terminology.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mapping_id_prefix": "acme", "terminology": {{"base_url": "http://localhost:8080/fhir"}}}}"#
        )
        .unwrap();

        let config = ConverterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.mapping_id_prefix, "acme");
        assert_eq!(
            config.terminology.base_url.as_deref(),
            Some("http://localhost:8080/fhir")
        );
        assert!(config.max_concurrent_groups >= 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = ConverterConfig {
            max_concurrent_groups: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ConverterConfig::default().with_terminology_url("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = ConverterConfig::new()
            .with_mapping_id_prefix("x")
            .with_max_concurrent_groups(0)
            .with_terminology_token("t");
        assert_eq!(config.max_concurrent_groups, 1);
        assert_eq!(config.terminology.auth_token.as_deref(), Some("t"));
        assert_eq!(config.sequential().max_concurrent_groups, 1);
    }
}
