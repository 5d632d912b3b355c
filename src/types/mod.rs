//! FHIR R4 resource model for the subset of resources the converter emits.

pub mod bundle;
pub mod datatypes;
pub mod resources;

pub use bundle::*;
pub use datatypes::*;
pub use resources::*;
