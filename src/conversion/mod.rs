//! Message-level orchestration: header, patient, encounter, groups and the final bundle.

pub mod header;
pub mod lookup;
pub mod orchestrator;
pub mod result;

pub use header::MessageHeader;
pub use lookup::{EncounterLookup, InMemoryEncounterLookup};
pub use orchestrator::Hl7v2Converter;
pub use result::ConversionResult;
