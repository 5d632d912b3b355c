use serde::{Deserialize, Serialize};

use super::resources::*;

/// Any resource the converter emits, tagged by `resourceType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(Patient),
    Encounter(Encounter),
    Coverage(Coverage),
    Condition(Condition),
    ServiceRequest(ServiceRequest),
    MedicationRequest(MedicationRequest),
    Observation(Observation),
    DiagnosticReport(DiagnosticReport),
    Immunization(Immunization),
}

impl Resource {
    pub fn resource_type(&self) -> &'static str {
        match self {
            Resource::Patient(_) => "Patient",
            Resource::Encounter(_) => "Encounter",
            Resource::Coverage(_) => "Coverage",
            Resource::Condition(_) => "Condition",
            Resource::ServiceRequest(_) => "ServiceRequest",
            Resource::MedicationRequest(_) => "MedicationRequest",
            Resource::Observation(_) => "Observation",
            Resource::DiagnosticReport(_) => "DiagnosticReport",
            Resource::Immunization(_) => "Immunization",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::Patient(r) => &r.id,
            Resource::Encounter(r) => &r.id,
            Resource::Coverage(r) => &r.id,
            Resource::Condition(r) => &r.id,
            Resource::ServiceRequest(r) => &r.id,
            Resource::MedicationRequest(r) => &r.id,
            Resource::Observation(r) => &r.id,
            Resource::DiagnosticReport(r) => &r.id,
            Resource::Immunization(r) => &r.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: Resource,
    pub request: BundleRequest,
}

/// A FHIR transaction bundle whose entries are all addressed by deterministic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Default for Bundle {
    fn default() -> Self {
        Self::transaction()
    }
}

impl Bundle {
    pub fn transaction() -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            type_: "transaction".to_string(),
            entry: Vec::new(),
        }
    }

    /// Append a resource as a `PUT /{type}/{id}` entry.
    pub fn push(&mut self, resource: Resource) {
        let url = format!("/{}/{}", resource.resource_type(), resource.id());
        self.entry.push(BundleEntry {
            resource,
            request: BundleRequest {
                method: "PUT".to_string(),
                url,
            },
        });
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entry.iter().map(|e| &e.resource)
    }

    /// Resources of one type, in bundle order.
    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources()
            .filter(move |r| r.resource_type() == resource_type)
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObservationValue, Quantity};

    #[test]
    fn test_bundle_entries_are_put_by_id() {
        let mut bundle = Bundle::transaction();
        bundle.push(Resource::Patient(Patient {
            id: "p1".to_string(),
            ..Default::default()
        }));

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["resourceType"], "Bundle");
        assert_eq!(json["type"], "transaction");
        assert_eq!(json["entry"][0]["resource"]["resourceType"], "Patient");
        assert_eq!(json["entry"][0]["request"]["method"], "PUT");
        assert_eq!(json["entry"][0]["request"]["url"], "/Patient/p1");
    }

    #[test]
    fn test_observation_value_is_flattened() {
        let obs = Observation {
            id: "o1".to_string(),
            status: "final".to_string(),
            value: Some(ObservationValue::Quantity(Quantity::value(4.5))),
            ..Default::default()
        };
        let json = serde_json::to_value(Resource::Observation(obs)).unwrap();
        assert_eq!(json["valueQuantity"]["value"], 4.5);
        assert!(json.get("value").is_none());
    }
}
