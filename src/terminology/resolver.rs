use std::sync::Arc;

use super::tables::normalize_system;
use super::{ConceptMapSource, LocalCode, MappingError, Resolution, ResolutionContext, mapping_id};
use crate::core::SenderContext;
use crate::segment::non_empty;

/// Tiered code resolution shared by every coded field the converter maps.
///
/// 1. absent code: the context default if it has one, otherwise a mapping error
/// 2. static table for the mapping type
/// 3. the sender's ConceptMap for the mapping type, restricted to valid target codes
/// 4. a mapping error
#[derive(Clone)]
pub struct CodeResolver {
    source: Arc<dyn ConceptMapSource>,
    mapping_id_prefix: String,
}

impl std::fmt::Debug for CodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeResolver")
            .field("mapping_id_prefix", &self.mapping_id_prefix)
            .finish_non_exhaustive()
    }
}

impl CodeResolver {
    pub fn new(source: Arc<dyn ConceptMapSource>, mapping_id_prefix: impl Into<String>) -> Self {
        Self {
            source,
            mapping_id_prefix: mapping_id_prefix.into(),
        }
    }

    pub fn mapping_id_prefix(&self) -> &str {
        &self.mapping_id_prefix
    }

    pub async fn resolve(
        &self,
        local: LocalCode<'_>,
        context: &ResolutionContext,
        sender: &SenderContext,
    ) -> Resolution {
        let Some(code) = local.code.and_then(non_empty) else {
            return match context.default_when_absent {
                Some(default) => Resolution::Resolved(default.to_string()),
                None => Resolution::Unmapped(mapping_error("", local, context)),
            };
        };

        if let Some(target) = context.mapping_type.static_target(code) {
            return Resolution::Resolved(target.to_string());
        }

        let id = mapping_id(&self.mapping_id_prefix, sender, context.mapping_type);
        let local_system = local_system(local, context);

        match self.source.fetch(&id).await {
            Some(map) => {
                let translated = map.translate(&local_system, code, |target| {
                    context.mapping_type.is_valid_target(target)
                });
                if let Some(translated) = translated {
                    tracing::debug!(
                        "Resolved {} code {} to {} via ConceptMap/{}",
                        context.mapping_type,
                        code,
                        translated.code,
                        id
                    );
                    return Resolution::Resolved(translated.code);
                }
                tracing::debug!("ConceptMap/{} has no usable entry for {}", id, code);
            }
            None => tracing::debug!("ConceptMap/{} not available", id),
        }

        let error = mapping_error(code, local, context);
        tracing::info!("Unmapped code: {}", error);
        Resolution::Unmapped(error)
    }
}

fn local_system(local: LocalCode<'_>, context: &ResolutionContext) -> String {
    local
        .system
        .and_then(non_empty)
        .map(normalize_system)
        .unwrap_or_else(|| context.mapping_type.local_system().to_string())
}

fn mapping_error(code: &str, local: LocalCode<'_>, context: &ResolutionContext) -> MappingError {
    MappingError {
        local_code: code.to_string(),
        local_display: local.display.and_then(non_empty).map(str::to_string),
        local_system: local_system(local, context),
        mapping_type: context.mapping_type,
        source_field_label: context.source_field.to_string(),
        target_field_label: context.target_field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObservationRole;
    use crate::terminology::{ConceptMap, InMemoryConceptMapSource, MappingType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every fetch and answers from an inner in-memory source.
    #[derive(Default)]
    struct RecordingSource {
        inner: InMemoryConceptMapSource,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConceptMapSource for RecordingSource {
        async fn fetch(&self, id: &str) -> Option<ConceptMap> {
            self.fetched.lock().unwrap().push(id.to_string());
            self.inner.fetch(id).await
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl ConceptMapSource for PanickingSource {
        async fn fetch(&self, id: &str) -> Option<ConceptMap> {
            panic!("unexpected external lookup for {id}");
        }
    }

    fn sender() -> SenderContext {
        SenderContext::new("Lab App", "Main Hospital")
    }

    #[tokio::test]
    async fn test_static_table_never_fetches() {
        let resolver = CodeResolver::new(Arc::new(PanickingSource), "hl7v2");
        let resolution = resolver
            .resolve(
                LocalCode::new("CM"),
                &ResolutionContext::order_status(),
                &sender(),
            )
            .await;
        assert_eq!(resolution, Resolution::Resolved("completed".to_string()));
    }

    #[tokio::test]
    async fn test_absent_code_is_an_error_without_lookup() {
        let resolver = CodeResolver::new(Arc::new(PanickingSource), "hl7v2");
        let resolution = resolver
            .resolve(
                LocalCode::absent(),
                &ResolutionContext::observation_status(ObservationRole::FinalResult),
                &sender(),
            )
            .await;
        let Resolution::Unmapped(error) = resolution else {
            panic!("expected mapping error");
        };
        assert_eq!(error.local_code, "");
        assert_eq!(error.source_field_label, "OBX-11");
    }

    #[tokio::test]
    async fn test_absent_code_uses_context_default() {
        let resolver = CodeResolver::new(Arc::new(PanickingSource), "hl7v2");
        let resolution = resolver
            .resolve(
                LocalCode::new("  "),
                &ResolutionContext::observation_status(ObservationRole::OrderEntry),
                &sender(),
            )
            .await;
        assert_eq!(resolution, Resolution::Resolved("registered".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_code_fetches_sender_map_once() {
        let mut inner = InMemoryConceptMapSource::new();
        inner.add_sender_mapping("hl7v2", &sender(), MappingType::OrderStatus, "ZZ", "on-hold");
        let source = Arc::new(RecordingSource {
            inner,
            fetched: Mutex::new(Vec::new()),
        });
        let resolver = CodeResolver::new(source.clone(), "hl7v2");

        let resolution = resolver
            .resolve(
                LocalCode::new("ZZ"),
                &ResolutionContext::order_status(),
                &sender(),
            )
            .await;

        assert_eq!(resolution, Resolution::Resolved("on-hold".to_string()));
        assert_eq!(
            *source.fetched.lock().unwrap(),
            vec!["hl7v2-lab-app-main-hospital-orc-status".to_string()]
        );
    }

    #[tokio::test]
    async fn test_external_target_outside_vocabulary_is_rejected() {
        let mut inner = InMemoryConceptMapSource::new();
        inner.add_sender_mapping(
            "hl7v2",
            &sender(),
            MappingType::ObservationStatus,
            "Q",
            "done",
        );
        let resolver = CodeResolver::new(Arc::new(inner), "hl7v2");

        let resolution = resolver
            .resolve(
                LocalCode::new("Q").with_display("Queued"),
                &ResolutionContext::observation_status(ObservationRole::FinalResult),
                &sender(),
            )
            .await;

        let error = resolution.into_result().unwrap_err();
        assert_eq!(error.local_code, "Q");
        assert_eq!(error.local_display.as_deref(), Some("Queued"));
        assert_eq!(error.mapping_type, MappingType::ObservationStatus);
        assert_eq!(
            error.local_system,
            "http://terminology.hl7.org/CodeSystem/v2-0085"
        );
        assert_eq!(error.target_field_label, "Observation.status");
    }

    #[tokio::test]
    async fn test_explicit_local_system_is_normalized() {
        let mut map = ConceptMap::default();
        map.add_mapping("http://snomed.info/sct", "x", "1234", "EMER");
        let mut inner = InMemoryConceptMapSource::new();
        inner.insert(
            mapping_id("hl7v2", &sender(), MappingType::PatientClass),
            map,
        );
        let resolver = CodeResolver::new(Arc::new(inner), "hl7v2");

        let resolution = resolver
            .resolve(
                LocalCode::new("1234").with_system("SCT"),
                &ResolutionContext::patient_class(),
                &sender(),
            )
            .await;
        assert_eq!(resolution, Resolution::Resolved("EMER".to_string()));
    }
}
