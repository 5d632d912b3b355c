//! Per-segment conversion into FHIR resources.
//!
//! Everything in this module is synchronous and side-effect free: ids, references and resolved
//! status codes are computed by the orchestrator and passed in.

pub mod condition;
pub mod coverage;
pub mod datatypes;
pub mod diagnostic_report;
pub mod encounter;
pub mod immunization;
pub mod observation;
pub mod patient;
pub mod request;

pub use condition::*;
pub use coverage::*;
pub use diagnostic_report::*;
pub use encounter::*;
pub use immunization::*;
pub use observation::*;
pub use patient::*;
pub use request::*;

use crate::segment::{Segment, non_empty};
use crate::types::{Annotation, Reference};

/// The patient and, when known, the encounter every clinical resource points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRefs {
    pub patient: Reference,
    pub encounter: Option<Reference>,
}

impl SubjectRefs {
    pub fn new(patient: Reference, encounter: Option<Reference>) -> Self {
        Self { patient, encounter }
    }
}

/// NTE-3 text, repetitions joined by newlines.
pub fn note_text(nte: &Segment) -> Option<String> {
    let text = nte
        .repetitions(3)
        .iter()
        .map(|r| r.component(1))
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(&text).map(str::to_string)
}

pub fn annotations(notes: &[&Segment]) -> Vec<Annotation> {
    notes
        .iter()
        .filter_map(|nte| note_text(nte))
        .map(|text| Annotation { text })
        .collect()
}
