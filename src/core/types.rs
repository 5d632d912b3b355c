use serde::{Deserialize, Serialize};

/// The originating system of a message, taken from MSH-3 and MSH-4.
///
/// Scopes every external mapping lookup and seeds identity namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderContext {
    pub sending_application: String,
    pub sending_facility: String,
}

impl SenderContext {
    pub fn new(application: impl Into<String>, facility: impl Into<String>) -> Self {
        Self {
            sending_application: application.into(),
            sending_facility: facility.into(),
        }
    }
}

/// Message families the converter accepts (MSH-9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Adt,
    Orm,
    Oml,
    Oru,
    Vxu,
}

impl MessageType {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "ADT" => Some(MessageType::Adt),
            "ORM" => Some(MessageType::Orm),
            "OML" => Some(MessageType::Oml),
            "ORU" => Some(MessageType::Oru),
            "VXU" => Some(MessageType::Vxu),
            _ => None,
        }
    }

    /// Whether the message is expected to carry order or result groups.
    pub fn carries_orders(&self) -> bool {
        !matches!(self, MessageType::Adt)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Adt => write!(f, "ADT"),
            MessageType::Orm => write!(f, "ORM"),
            MessageType::Oml => write!(f, "OML"),
            MessageType::Oru => write!(f, "ORU"),
            MessageType::Vxu => write!(f, "VXU"),
        }
    }
}

/// Whether an observation supports an order being placed or reports a result.
///
/// Changes how an absent OBX-11 status is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationRole {
    OrderEntry,
    FinalResult,
}
