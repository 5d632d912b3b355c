use std::sync::LazyLock;

use regex::Regex;

use super::{Component, Field, Message, Repetition, Segment};
use crate::error::{ConversionError, Result};

static RTF_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-z]+\d*\s?").expect("valid RTF control regex"));
static SEGMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]{2}(\W|$)").expect("valid segment regex"));

/// Delimiters declared in MSH-1/MSH-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingCharacters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for EncodingCharacters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl EncodingCharacters {
    /// Read the delimiters from an `MSH` line.
    pub fn from_msh(line: &str) -> Result<Self> {
        let mut chars = line.chars().skip(3);
        let field = chars.next().ok_or_else(|| ConversionError::Decode {
            message: "MSH segment has no field separator".to_string(),
        })?;
        let declared: Vec<char> = chars.take_while(|c| *c != field).collect();
        let defaults = Self::default();

        Ok(Self {
            field,
            component: declared.first().copied().unwrap_or(defaults.component),
            repetition: declared.get(1).copied().unwrap_or(defaults.repetition),
            escape: declared.get(2).copied().unwrap_or(defaults.escape),
            subcomponent: declared.get(3).copied().unwrap_or(defaults.subcomponent),
        })
    }
}

/// Split raw text into messages. Each `MSH` starts a new message; lines that do not look like
/// segments are dropped, as is an RTF wrapper around the whole payload.
pub fn decode_messages(text: &str) -> Result<Vec<Message>> {
    let text = if text.starts_with("{\\rtf") {
        let stripped = RTF_CONTROL.replace_all(text, "");
        stripped.replace(['{', '}'], "")
    } else {
        text.to_string()
    };

    let mut messages = Vec::new();
    let mut current: Option<(EncodingCharacters, Vec<Segment>)> = None;

    for line in text.split(['\r', '\n']) {
        let line = line.trim();
        if line.is_empty() || !SEGMENT_LINE.is_match(line) {
            continue;
        }

        if line.starts_with("MSH") {
            if let Some((_, segments)) = current.take() {
                messages.push(Message::new(segments));
            }
            let encoding = EncodingCharacters::from_msh(line)?;
            current = Some((encoding, vec![decode_segment(line, &encoding)?]));
            continue;
        }

        match current.as_mut() {
            Some((encoding, segments)) => segments.push(decode_segment(line, encoding)?),
            None => tracing::debug!("Dropping segment before first MSH: {}", &line[..3]),
        }
    }

    if let Some((_, segments)) = current {
        messages.push(Message::new(segments));
    }

    Ok(messages)
}

/// Decode one segment line.
pub fn decode_segment(line: &str, encoding: &EncodingCharacters) -> Result<Segment> {
    let line = line.trim_end();
    let mut parts = line.split(encoding.field);
    let tag = parts.next().unwrap_or_default();
    if tag.len() != 3 {
        return Err(ConversionError::Decode {
            message: format!("invalid segment tag: {tag:?}"),
        });
    }

    let mut fields = Vec::new();
    if tag == "MSH" {
        fields.push(Field {
            raw: encoding.field.to_string(),
            repetitions: vec![literal_repetition(&encoding.field.to_string())],
        });
        let declared = parts.next().unwrap_or_default();
        fields.push(Field {
            raw: declared.to_string(),
            repetitions: vec![literal_repetition(declared)],
        });
    }
    fields.extend(parts.map(|raw| decode_field(raw, encoding)));

    Ok(Segment::new(tag, fields))
}

pub fn decode_field(raw: &str, encoding: &EncodingCharacters) -> Field {
    let repetitions = raw
        .split(encoding.repetition)
        .map(|rep| Repetition {
            components: rep
                .split(encoding.component)
                .map(|comp| Component {
                    subcomponents: comp
                        .split(encoding.subcomponent)
                        .map(|sub| unescape(sub, encoding))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Field {
        raw: raw.to_string(),
        repetitions,
    }
}

fn literal_repetition(value: &str) -> Repetition {
    Repetition {
        components: vec![Component {
            subcomponents: vec![value.to_string()],
        }],
    }
}

/// Resolve the delimiter escape sequences (`\F\`, `\S\`, `\T\`, `\R\`, `\E\`).
/// Unknown sequences are kept verbatim.
fn unescape(value: &str, encoding: &EncodingCharacters) -> String {
    if !value.contains(encoding.escape) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(encoding.escape) {
        out.push_str(&rest[..start]);
        let after = &rest[start + encoding.escape.len_utf8()..];
        let Some(end) = after.find(encoding.escape) else {
            out.push_str(&rest[start..]);
            return out;
        };
        match &after[..end] {
            "F" => out.push(encoding.field),
            "S" => out.push(encoding.component),
            "T" => out.push(encoding.subcomponent),
            "R" => out.push(encoding.repetition),
            "E" => out.push(encoding.escape),
            ".br" => out.push('\n'),
            other => {
                out.push(encoding.escape);
                out.push_str(other);
                out.push(encoding.escape);
            }
        }
        rest = &after[end + encoding.escape.len_utf8()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_multiple_messages() {
        let text = "MSH|^~\\&|A|B|||||ADT^A01|1|P|2.5\rPID|1||1\rMSH|^~\\&|A|B|||||ADT^A08|2|P|2.5\nPID|1||2\n";
        let messages = decode_messages(text).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].segments().len(), 2);
        assert_eq!(messages[1].segments()[1].value(3), "2");
    }

    #[test]
    fn test_segments_before_msh_are_dropped() {
        let text = "PID|1||0\nMSH|^~\\&|A|B\nPID|1||1";
        let messages = decode_messages(text).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].segments().len(), 2);
    }

    #[test]
    fn test_custom_encoding_characters() {
        let text = "MSH#$*!@#A#B\nOBX#1#CWE#X$Y$LN*Z$W";
        let messages = decode_messages(text).unwrap();
        let obx = &messages[0].segments()[1];
        assert_eq!(obx.component(3, 3), "LN");
        assert_eq!(obx.repetitions(3).len(), 2);
    }

    #[test]
    fn test_escape_sequences() {
        let seg = Segment::parse("NTE|1||Ratio 1\\S\\2 \\F\\ done").unwrap();
        assert_eq!(seg.value(3), "Ratio 1^2 | done");
        assert_eq!(seg.raw(3), "Ratio 1\\S\\2 \\F\\ done");
    }

    #[test]
    fn test_rtf_wrapper_is_stripped() {
        let text = "{\\rtf1\\ansi MSH|^~\\&|A|B\\par \nPID|1||9\\par \n}";
        let messages = decode_messages(text).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].segments()[1].value(3), "9");
    }
}
