use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::terminology::MappingError;
use crate::types::{Bundle, Reference};

/// Outcome of converting one message. Exactly one variant, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    #[serde(rename_all = "camelCase")]
    Processed {
        bundle: Bundle,
        patient_ref: Reference,
    },
    #[serde(rename_all = "camelCase")]
    Warning {
        bundle: Bundle,
        patient_ref: Reference,
        warning_message: String,
    },
    /// A structural failure, or unresolved codes (then `mapping_errors` is non-empty).
    #[serde(rename_all = "camelCase")]
    Error {
        error_message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        mapping_errors: Vec<MappingError>,
    },
}

impl ConversionResult {
    pub fn from_error(error: &ConversionError) -> Self {
        ConversionResult::Error {
            error_message: error.to_string(),
            mapping_errors: Vec::new(),
        }
    }

    pub fn from_mapping_errors(mapping_errors: Vec<MappingError>) -> Self {
        let error_message = match mapping_errors.len() {
            1 => format!("Unmapped code: {}", mapping_errors[0]),
            n => format!("{n} codes could not be mapped"),
        };
        ConversionResult::Error {
            error_message,
            mapping_errors,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ConversionResult::Processed { .. } => "processed",
            ConversionResult::Warning { .. } => "warning",
            ConversionResult::Error { .. } => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ConversionResult::Error { .. })
    }

    pub fn bundle(&self) -> Option<&Bundle> {
        match self {
            ConversionResult::Processed { bundle, .. } | ConversionResult::Warning { bundle, .. } => {
                Some(bundle)
            }
            ConversionResult::Error { .. } => None,
        }
    }

    pub fn patient_ref(&self) -> Option<&Reference> {
        match self {
            ConversionResult::Processed { patient_ref, .. }
            | ConversionResult::Warning { patient_ref, .. } => Some(patient_ref),
            ConversionResult::Error { .. } => None,
        }
    }

    pub fn mapping_errors(&self) -> &[MappingError] {
        match self {
            ConversionResult::Error { mapping_errors, .. } => mapping_errors,
            _ => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConversionResult::Error { error_message, .. } => Some(error_message),
            _ => None,
        }
    }
}
