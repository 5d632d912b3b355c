use crate::core::{MessageType, SenderContext};
use crate::error::{ConversionError, Result};
use crate::segment::Segment;

/// The parts of MSH the converter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub sender: SenderContext,
    pub message_type: MessageType,
    pub trigger_event: Option<String>,
    pub control_id: Option<String>,
}

impl MessageHeader {
    /// Read sender (MSH-3.1, MSH-4.1) and message type (MSH-9). Both sender parts are required.
    pub fn from_msh(msh: &Segment) -> Result<Self> {
        let application = msh
            .opt_component(3, 1)
            .ok_or(ConversionError::MissingSender { field: "MSH-3" })?;
        let facility = msh
            .opt_component(4, 1)
            .ok_or(ConversionError::MissingSender { field: "MSH-4" })?;

        let code = msh.component(9, 1);
        let message_type =
            MessageType::parse(code).ok_or_else(|| ConversionError::UnsupportedMessageType {
                message_type: if code.trim().is_empty() {
                    "<empty>".to_string()
                } else {
                    code.trim().to_string()
                },
            })?;

        Ok(Self {
            sender: SenderContext::new(application, facility),
            message_type,
            trigger_event: msh.opt_component(9, 2).map(str::to_string),
            control_id: msh.opt_value(10).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msh(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let header = MessageHeader::from_msh(&msh(
            "MSH|^~\\&|LAB^1.2.3^ISO|HOSP|||20240101||ORU^R01^ORU_R01|MSG1|P|2.5.1",
        ))
        .unwrap();
        assert_eq!(header.sender, SenderContext::new("LAB", "HOSP"));
        assert_eq!(header.message_type, MessageType::Oru);
        assert_eq!(header.trigger_event.as_deref(), Some("R01"));
        assert_eq!(header.control_id.as_deref(), Some("MSG1"));
    }

    #[test]
    fn test_missing_sender() {
        let err = MessageHeader::from_msh(&msh("MSH|^~\\&||HOSP|||||ADT^A01|1|P|2.5")).unwrap_err();
        assert!(matches!(err, ConversionError::MissingSender { field: "MSH-3" }));
    }

    #[test]
    fn test_unsupported_type() {
        let err =
            MessageHeader::from_msh(&msh("MSH|^~\\&|A|B|||||SIU^S12|1|P|2.5")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported message type: SIU");
    }
}
