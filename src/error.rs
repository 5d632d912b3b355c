use thiserror::Error;

use crate::identity::IdentityError;

/// Structural failures that abort the conversion of a whole message.
///
/// Unresolved codes are not errors in this sense: they are collected as
/// [`MappingError`](crate::terminology::MappingError) values and surfaced through
/// [`ConversionResult`](crate::conversion::ConversionResult).
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Missing required segment: {segment}")]
    MissingSegment { segment: &'static str },

    #[error("Missing sender identity: {field} is empty")]
    MissingSender { field: &'static str },

    #[error("Unsupported message type: {message_type}")]
    UnsupportedMessageType { message_type: String },

    #[error("No usable identifier for {resource}: {source}")]
    Identity {
        resource: &'static str,
        #[source]
        source: IdentityError,
    },

    #[error("Message contains no processable content")]
    NoProcessableContent,

    #[error("Malformed segment {segment}: {message}")]
    Malformed {
        segment: &'static str,
        message: String,
    },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    pub fn identity(resource: &'static str, source: IdentityError) -> Self {
        Self::Identity { resource, source }
    }

    pub fn malformed(segment: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            segment,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
