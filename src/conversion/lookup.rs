use std::collections::HashMap;

use async_trait::async_trait;

/// Finds encounters already stored for a patient, so a visit that arrives again keeps its id.
///
/// Returns the ids of every match; failures should be reported as no match.
#[async_trait]
pub trait EncounterLookup: Send + Sync {
    async fn find_encounters(&self, patient_id: &str, visit_number: Option<&str>) -> Vec<String>;
}

/// Encounter ids keyed by `(patient id, visit number)`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEncounterLookup {
    encounters: HashMap<(String, String), Vec<String>>,
}

impl InMemoryEncounterLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        patient_id: impl Into<String>,
        visit_number: impl Into<String>,
        encounter_id: impl Into<String>,
    ) {
        self.encounters
            .entry((patient_id.into(), visit_number.into()))
            .or_default()
            .push(encounter_id.into());
    }
}

#[async_trait]
impl EncounterLookup for InMemoryEncounterLookup {
    async fn find_encounters(&self, patient_id: &str, visit_number: Option<&str>) -> Vec<String> {
        let Some(visit) = visit_number else {
            return Vec::new();
        };
        self.encounters
            .get(&(patient_id.to_string(), visit.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let mut lookup = InMemoryEncounterLookup::new();
        lookup.insert("p1", "V1", "enc-a");
        lookup.insert("p1", "V1", "enc-b");

        assert_eq!(lookup.find_encounters("p1", Some("V1")).await.len(), 2);
        assert!(lookup.find_encounters("p1", Some("V2")).await.is_empty());
        assert!(lookup.find_encounters("p1", None).await.is_empty());
    }

    #[test]
    fn test_lookup_behind_trait_object() {
        let mut lookup = InMemoryEncounterLookup::new();
        lookup.insert("p1", "V1", "enc-a");
        let lookup: Box<dyn EncounterLookup> = Box::new(lookup);

        let found = tokio_test::block_on(lookup.find_encounters("p1", Some("V1")));
        assert_eq!(found, vec!["enc-a".to_string()]);
    }
}
