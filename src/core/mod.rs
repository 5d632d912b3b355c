pub mod config;
pub mod types;

pub use config::{ConverterConfig, TerminologyConfig};
pub use types::*;
