//! # OctoFHIR HL7v2
//!
//! Converts HL7v2 messages (ADT, ORM/OML, ORU, VXU) into FHIR R4 transaction bundles.
//!
//! ## Features
//!
//! - **Order grouping**: rebuilds the ORC/OBR/OBX hierarchy from the flat segment stream
//! - **Deterministic identity**: every resource id is derived from message content, so the
//!   same message always produces the same `PUT` entries
//! - **Tiered terminology**: static v2 tables first, then sender-specific ConceptMaps from a
//!   terminology store; unresolved codes are reported as structured mapping errors
//! - **All-or-nothing**: a message with any unmapped code yields no partial bundle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use octofhir_hl7v2::*;
//!
//! # async fn example() -> Result<()> {
//! let converter = Hl7v2Converter::new(
//!     ConverterConfig::default(),
//!     Arc::new(InMemoryConceptMapSource::new()),
//! );
//!
//! let message = Message::parse("MSH|^~\\&|LAB|HOSP|||20240101||ADT^A01|1|P|2.5\rPID|1||123^^^HOSP")?;
//! let result = converter.convert(&message).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod conversion;
pub mod converter;
pub mod core;
pub mod error;
pub mod grouping;
pub mod identity;
pub mod segment;
pub mod terminology;
pub mod types;

pub use conversion::{
    ConversionResult, EncounterLookup, Hl7v2Converter, InMemoryEncounterLookup, MessageHeader,
};
pub use crate::core::{ConverterConfig, MessageType, ObservationRole, SenderContext, TerminologyConfig};
pub use error::{ConversionError, Result};
pub use grouping::{OrderDetail, OrderGroup, ResultGroup, group_orders, group_results};
pub use identity::{EntityIdentifier, IdentityError, build_id, sanitize};
pub use segment::{Message, Segment, SegmentKind, decode_messages};
#[cfg(feature = "http-source")]
pub use terminology::HttpConceptMapSource;
pub use terminology::{
    CodeResolver, ConceptMap, ConceptMapSource, InMemoryConceptMapSource, LocalCode, MappingError,
    MappingType, Resolution, ResolutionContext,
};
pub use types::{Bundle, Resource};
