use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::MappingType;
use super::tables::normalize_system;
use crate::core::SenderContext;
use crate::identity::to_kebab_case;

/// Sender-scoped mapping table in the shape of a FHIR R4 `ConceptMap`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub group: Vec<ConceptMapGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub element: Vec<ConceptMapElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapElement {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default)]
    pub target: Vec<ConceptMapTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equivalence: Option<String>,
}

/// A matched target: `(target system, target code, target display)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedCode {
    pub system: Option<String>,
    pub code: String,
    pub display: Option<String>,
}

impl ConceptMap {
    /// Find the first usable target for `code` from `source_system`.
    ///
    /// Systems are compared after alias normalization. A group without a source matches any
    /// system. Targets marked `unmatched` or `disjoint` are skipped, and `accept` filters the
    /// candidate target codes.
    pub fn translate(
        &self,
        source_system: &str,
        code: &str,
        accept: impl Fn(&str) -> bool,
    ) -> Option<TranslatedCode> {
        let wanted = normalize_system(source_system);

        let groups = self.group.iter().filter(|g| {
            g.source
                .as_deref()
                .is_none_or(|s| normalize_system(s) == wanted)
        });

        for group in groups {
            for element in group.element.iter().filter(|e| e.code == code) {
                for target in &element.target {
                    if matches!(
                        target.equivalence.as_deref(),
                        Some("unmatched") | Some("disjoint")
                    ) {
                        continue;
                    }
                    let Some(target_code) = target.code.as_deref() else {
                        continue;
                    };
                    if accept(target_code) {
                        return Some(TranslatedCode {
                            system: group.target.clone(),
                            code: target_code.to_string(),
                            display: target.display.clone(),
                        });
                    }
                }
            }
        }

        None
    }

    /// Add one `source code → target code` element, creating the group when needed.
    pub fn add_mapping(
        &mut self,
        source_system: &str,
        target_system: &str,
        code: &str,
        target_code: &str,
    ) -> &mut Self {
        let index = match self.group.iter().position(|g| {
            g.source.as_deref() == Some(source_system) && g.target.as_deref() == Some(target_system)
        }) {
            Some(index) => index,
            None => {
                self.group.push(ConceptMapGroup {
                    source: Some(source_system.to_string()),
                    target: Some(target_system.to_string()),
                    element: Vec::new(),
                });
                self.group.len() - 1
            }
        };

        self.group[index].element.push(ConceptMapElement {
            code: code.to_string(),
            display: None,
            target: vec![ConceptMapTarget {
                code: Some(target_code.to_string()),
                display: None,
                equivalence: Some("equivalent".to_string()),
            }],
        });
        self
    }
}

/// Deterministic id of the ConceptMap holding a sender's mappings for one mapping type.
pub fn mapping_id(prefix: &str, sender: &SenderContext, mapping_type: MappingType) -> String {
    format!(
        "{}-{}-{}-{}",
        to_kebab_case(prefix),
        to_kebab_case(&sender.sending_application),
        to_kebab_case(&sender.sending_facility),
        mapping_type.as_str()
    )
}

/// Read-only access to sender ConceptMaps.
///
/// Implementations report every failure (transport, server error, missing resource) as
/// `None`; the resolver only cares whether a mapping exists.
#[async_trait]
pub trait ConceptMapSource: Send + Sync {
    async fn fetch(&self, id: &str) -> Option<ConceptMap>;
}

/// ConceptMaps held in memory, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConceptMapSource {
    maps: HashMap<String, ConceptMap>,
}

impl InMemoryConceptMapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, map: ConceptMap) {
        self.maps.insert(id.into(), map);
    }

    /// Register a mapping under the id the resolver will look up for `sender`.
    pub fn add_sender_mapping(
        &mut self,
        prefix: &str,
        sender: &SenderContext,
        mapping_type: MappingType,
        code: &str,
        target_code: &str,
    ) {
        let id = mapping_id(prefix, sender, mapping_type);
        let map = self.maps.entry(id.clone()).or_insert_with(|| ConceptMap {
            id: Some(id),
            group: Vec::new(),
        });
        map.add_mapping(
            mapping_type.local_system(),
            mapping_type.target_system(),
            code,
            target_code,
        );
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[async_trait]
impl ConceptMapSource for InMemoryConceptMapSource {
    async fn fetch(&self, id: &str) -> Option<ConceptMap> {
        self.maps.get(id).cloned()
    }
}
