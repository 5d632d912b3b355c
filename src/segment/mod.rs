//! Decoded HL7v2 segments.
//!
//! A [`Segment`] is a tag plus its ordered fields. Each field keeps its raw text alongside the
//! decoded repetition/component/subcomponent tree so converters can either read positional
//! values or reinterpret the original text (structured numerics, opaque values).
//!
//! Field numbers are 1-based and follow the HL7 convention: for `MSH`, field 1 is the field
//! separator itself and field 2 the encoding characters.

mod decode;

pub use decode::*;

use serde::{Deserialize, Serialize};

/// Segment tags the converter dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Msh,
    Pid,
    Pv1,
    In1,
    Orc,
    Obr,
    Rxo,
    Rxa,
    Nte,
    Dg1,
    Obx,
    Other,
}

impl SegmentKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "MSH" => SegmentKind::Msh,
            "PID" => SegmentKind::Pid,
            "PV1" => SegmentKind::Pv1,
            "IN1" => SegmentKind::In1,
            "ORC" => SegmentKind::Orc,
            "OBR" => SegmentKind::Obr,
            "RXO" => SegmentKind::Rxo,
            "RXA" => SegmentKind::Rxa,
            "NTE" => SegmentKind::Nte,
            "DG1" => SegmentKind::Dg1,
            "OBX" => SegmentKind::Obx,
            _ => SegmentKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub subcomponents: Vec<String>,
}

impl Component {
    /// First subcomponent, or `""`.
    pub fn value(&self) -> &str {
        self.subcomponent(1)
    }

    pub fn subcomponent(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.subcomponents.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repetition {
    pub components: Vec<Component>,
}

impl Repetition {
    pub fn component(&self, index: usize) -> &str {
        self.get(index).map(Component::value).unwrap_or("")
    }

    pub fn subcomponent(&self, index: usize, sub: usize) -> &str {
        self.get(index).map(|c| c.subcomponent(sub)).unwrap_or("")
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        index.checked_sub(1).and_then(|i| self.components.get(i))
    }

    /// Component values in order, first subcomponent only.
    pub fn values(&self) -> Vec<&str> {
        self.components.iter().map(Component::value).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components
            .iter()
            .all(|c| c.subcomponents.iter().all(|s| s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub raw: String,
    pub repetitions: Vec<Repetition>,
}

impl Field {
    pub fn first(&self) -> Option<&Repetition> {
        self.repetitions.first()
    }

    pub fn is_empty(&self) -> bool {
        self.repetitions.iter().all(Repetition::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    tag: String,
    fields: Vec<Field>,
}

impl Segment {
    pub fn new(tag: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            tag: tag.into(),
            fields,
        }
    }

    /// Decode a single segment line with the default encoding characters.
    pub fn parse(line: &str) -> crate::Result<Self> {
        decode_segment(line, &EncodingCharacters::default())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> SegmentKind {
        SegmentKind::from_tag(&self.tag)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        index.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn raw(&self, index: usize) -> &str {
        self.field(index).map(|f| f.raw.as_str()).unwrap_or("")
    }

    pub fn repetitions(&self, index: usize) -> &[Repetition] {
        self.field(index)
            .map(|f| f.repetitions.as_slice())
            .unwrap_or(&[])
    }

    /// First repetition of a field, if the field has any content.
    pub fn first(&self, index: usize) -> Option<&Repetition> {
        self.field(index).and_then(Field::first).filter(|r| !r.is_empty())
    }

    pub fn value(&self, index: usize) -> &str {
        self.component(index, 1)
    }

    pub fn component(&self, index: usize, component: usize) -> &str {
        self.field(index)
            .and_then(Field::first)
            .map(|r| r.component(component))
            .unwrap_or("")
    }

    pub fn subcomponent(&self, index: usize, component: usize, sub: usize) -> &str {
        self.field(index)
            .and_then(Field::first)
            .map(|r| r.subcomponent(component, sub))
            .unwrap_or("")
    }

    /// Trimmed first value of a field, `None` when blank.
    pub fn opt_value(&self, index: usize) -> Option<&str> {
        non_empty(self.value(index))
    }

    pub fn opt_component(&self, index: usize, component: usize) -> Option<&str> {
        non_empty(self.component(index, component))
    }

    pub fn is_field_empty(&self, index: usize) -> bool {
        self.field(index).is_none_or(Field::is_empty)
    }
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// One decoded message: the ordered segment stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Decode a single message; trailing messages in the same text are rejected.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let mut messages = decode_messages(text)?;
        match messages.len() {
            1 => Ok(messages.remove(0)),
            0 => Err(crate::ConversionError::Decode {
                message: "no MSH segment found".to_string(),
            }),
            n => Err(crate::ConversionError::Decode {
                message: format!("expected one message, found {n}"),
            }),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn first(&self, kind: SegmentKind) -> Option<&Segment> {
        self.segments.iter().find(|s| s.kind() == kind)
    }
}
