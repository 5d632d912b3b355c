//! Status and terminology resolution.
//!
//! Every ambiguous coded field goes through the same tiered lookup in [`CodeResolver`]:
//! a static v2 table first, then a sender-specific [`ConceptMap`] fetched from a
//! [`ConceptMapSource`]. A code that cannot be resolved becomes a [`MappingError`] value which
//! the orchestrator collects; it is never raised as an error.

mod concept_map;
#[cfg(feature = "http-source")]
mod http;
mod resolver;
pub mod tables;

pub use concept_map::*;
#[cfg(feature = "http-source")]
pub use http::HttpConceptMapSource;
pub use resolver::*;

use serde::{Deserialize, Serialize};

use crate::core::ObservationRole;

/// The kind of code being resolved; also the last segment of the external mapping id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingType {
    #[serde(rename = "orc-status")]
    OrderStatus,
    #[serde(rename = "obx-status")]
    ObservationStatus,
    #[serde(rename = "obr-status")]
    DiagnosticReportStatus,
    #[serde(rename = "patient-class")]
    PatientClass,
    #[serde(rename = "rxa-completion-status")]
    ImmunizationStatus,
}

impl MappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::OrderStatus => "orc-status",
            MappingType::ObservationStatus => "obx-status",
            MappingType::DiagnosticReportStatus => "obr-status",
            MappingType::PatientClass => "patient-class",
            MappingType::ImmunizationStatus => "rxa-completion-status",
        }
    }

    /// Static table lookup.
    pub fn static_target(&self, code: &str) -> Option<&'static str> {
        let code = code.trim().to_ascii_uppercase();
        match self {
            MappingType::OrderStatus => tables::order_status(&code),
            MappingType::ObservationStatus => tables::observation_status(&code),
            MappingType::DiagnosticReportStatus => tables::diagnostic_report_status(&code),
            MappingType::PatientClass => tables::patient_class(&code),
            MappingType::ImmunizationStatus => tables::immunization_status(&code),
        }
    }

    /// Codes an external mapping is allowed to resolve to.
    pub fn target_vocabulary(&self) -> &'static [&'static str] {
        match self {
            MappingType::OrderStatus => tables::REQUEST_STATUS,
            MappingType::ObservationStatus => tables::OBSERVATION_STATUS,
            MappingType::DiagnosticReportStatus => tables::DIAGNOSTIC_REPORT_STATUS,
            MappingType::PatientClass => tables::ENCOUNTER_CLASS,
            MappingType::ImmunizationStatus => tables::IMMUNIZATION_STATUS,
        }
    }

    pub fn is_valid_target(&self, code: &str) -> bool {
        self.target_vocabulary().contains(&code)
    }

    /// The v2 table local codes are drawn from.
    pub fn local_system(&self) -> &'static str {
        match self {
            MappingType::OrderStatus => tables::V2_ORDER_STATUS,
            MappingType::ObservationStatus => tables::V2_OBSERVATION_STATUS,
            MappingType::DiagnosticReportStatus => tables::V2_RESULT_STATUS,
            MappingType::PatientClass => tables::V2_PATIENT_CLASS,
            MappingType::ImmunizationStatus => tables::V2_COMPLETION_STATUS,
        }
    }

    pub fn target_system(&self) -> &'static str {
        match self {
            MappingType::OrderStatus => "http://hl7.org/fhir/request-status",
            MappingType::ObservationStatus => "http://hl7.org/fhir/observation-status",
            MappingType::DiagnosticReportStatus => "http://hl7.org/fhir/diagnostic-report-status",
            MappingType::PatientClass => tables::V3_ACT_CODE,
            MappingType::ImmunizationStatus => "http://hl7.org/fhir/event-status",
        }
    }
}

impl std::fmt::Display for MappingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a code comes from and where it goes, plus what to do when it is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionContext {
    pub mapping_type: MappingType,
    pub source_field: &'static str,
    pub target_field: &'static str,
    pub default_when_absent: Option<&'static str>,
}

impl ResolutionContext {
    pub const fn new(
        mapping_type: MappingType,
        source_field: &'static str,
        target_field: &'static str,
    ) -> Self {
        Self {
            mapping_type,
            source_field,
            target_field,
            default_when_absent: None,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default_when_absent = Some(default);
        self
    }

    /// ORC-5 → ServiceRequest.status. Absence is handled by the ORC-1 fallback, not here.
    pub const fn order_status() -> Self {
        Self::new(MappingType::OrderStatus, "ORC-5", "ServiceRequest.status")
    }

    /// ORC-5 of a pharmacy order → MedicationRequest.status; same vocabulary as lab orders.
    pub const fn medication_order_status() -> Self {
        Self::new(MappingType::OrderStatus, "ORC-5", "MedicationRequest.status")
    }

    /// OBX-11 → Observation.status. An order-entry observation without a status is
    /// `registered`; a reported result without one is a mapping error.
    pub const fn observation_status(role: ObservationRole) -> Self {
        let context = Self::new(MappingType::ObservationStatus, "OBX-11", "Observation.status");
        match role {
            ObservationRole::OrderEntry => context.with_default("registered"),
            ObservationRole::FinalResult => context,
        }
    }

    pub const fn diagnostic_report_status() -> Self {
        Self::new(
            MappingType::DiagnosticReportStatus,
            "OBR-25",
            "DiagnosticReport.status",
        )
    }

    pub const fn patient_class() -> Self {
        Self::new(MappingType::PatientClass, "PV1-2", "Encounter.class")
    }

    /// RXA-20; HL7 treats an empty completion status as complete.
    pub const fn immunization_status() -> Self {
        Self::new(
            MappingType::ImmunizationStatus,
            "RXA-20",
            "Immunization.status",
        )
        .with_default("completed")
    }
}

/// One local code that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingError {
    pub local_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_display: Option<String>,
    pub local_system: String,
    pub mapping_type: MappingType,
    pub source_field_label: String,
    pub target_field_label: String,
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = if self.local_code.is_empty() {
            "<empty>"
        } else {
            &self.local_code
        };
        write!(
            f,
            "{} value {} ({}) has no mapping to {}",
            self.source_field_label, code, self.local_system, self.target_field_label
        )
    }
}

/// The code as the sender wrote it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalCode<'a> {
    pub code: Option<&'a str>,
    pub display: Option<&'a str>,
    pub system: Option<&'a str>,
}

impl<'a> LocalCode<'a> {
    pub fn new(code: &'a str) -> Self {
        Self {
            code: Some(code),
            display: None,
            system: None,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with_display(mut self, display: &'a str) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_system(mut self, system: &'a str) -> Self {
        self.system = Some(system);
        self
    }
}

/// Outcome of one resolution: a target code or a mapping error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unmapped(MappingError),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn into_result(self) -> std::result::Result<String, MappingError> {
        match self {
            Resolution::Resolved(code) => Ok(code),
            Resolution::Unmapped(error) => Err(error),
        }
    }
}

/// Gathers mapping errors while a group is converted so that every error in the group is
/// reported, not only the first.
#[derive(Debug, Default)]
pub struct MappingErrors {
    errors: Vec<MappingError>,
}

impl MappingErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the resolved code, or record the error and yield `None`.
    pub fn take(&mut self, resolution: Resolution) -> Option<String> {
        match resolution {
            Resolution::Resolved(code) => Some(code),
            Resolution::Unmapped(error) => {
                self.errors.push(error);
                None
            }
        }
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = MappingError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_vec(self) -> Vec<MappingError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_role_changes_absent_policy() {
        assert_eq!(
            ResolutionContext::observation_status(ObservationRole::OrderEntry).default_when_absent,
            Some("registered")
        );
        assert_eq!(
            ResolutionContext::observation_status(ObservationRole::FinalResult)
                .default_when_absent,
            None
        );
    }

    #[test]
    fn test_mapping_error_serialization() {
        let error = MappingError {
            local_code: "ZZ".to_string(),
            local_display: None,
            local_system: tables::V2_ORDER_STATUS.to_string(),
            mapping_type: MappingType::OrderStatus,
            source_field_label: "ORC-5".to_string(),
            target_field_label: "ServiceRequest.status".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["localCode"], "ZZ");
        assert_eq!(json["mappingType"], "orc-status");
        assert!(json.get("localDisplay").is_none());
        assert_eq!(
            error.to_string(),
            "ORC-5 value ZZ (http://terminology.hl7.org/CodeSystem/v2-0038) has no mapping to ServiceRequest.status"
        );
    }

    #[test]
    fn test_collector() {
        let mut errors = MappingErrors::new();
        assert_eq!(
            errors.take(Resolution::Resolved("final".to_string())),
            Some("final".to_string())
        );
        assert!(errors.is_empty());
    }
}
