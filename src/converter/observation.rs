use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::datatypes::{codeable_concept, codeable_concept_opt, date, date_time};
use super::{SubjectRefs, annotations};
use crate::identity::composite_key;
use crate::segment::{Repetition, Segment, non_empty};
use crate::terminology::tables::{V2_ABNORMAL_FLAGS, normalize_system};
use crate::types::{
    CodeableConcept, Coding, Observation, ObservationReferenceRange, ObservationValue, Quantity,
    Range, Ratio,
};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("valid number regex"));
static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)\s*-\s*([+-]?\d+(?:\.\d+)?)\s*$")
        .expect("valid range regex")
});
static BOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(<=|>=|<|>)\s*([+-]?\d+(?:\.\d+)?)\s*$").expect("valid bound regex")
});

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if !NUMBER.is_match(value) {
        return None;
    }
    value.parse().ok()
}

/// An OBX-5 value of type SN, classified by its component pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredNumeric {
    Quantity {
        comparator: Option<String>,
        value: f64,
    },
    Range {
        low: f64,
        high: f64,
    },
    Ratio {
        numerator: f64,
        denominator: f64,
    },
    /// Anything else, carrying the value as sent.
    Opaque(String),
}

impl StructuredNumeric {
    /// `[comparator?, n]`, `["", n1, "-", n2]` or `["", n1, ":"|"/", n2]`.
    pub fn parse(rep: &Repetition, raw: &str) -> Self {
        let mut parts = rep.values();
        while parts.last().is_some_and(|p| p.trim().is_empty()) {
            parts.pop();
        }
        let opaque = || StructuredNumeric::Opaque(raw.to_string());

        match parts.as_slice() {
            [n] => match parse_number(n) {
                Some(value) => StructuredNumeric::Quantity {
                    comparator: None,
                    value,
                },
                None => opaque(),
            },
            [comparator, n] => {
                let comparator = comparator.trim();
                let Some(value) = parse_number(n) else {
                    return opaque();
                };
                match comparator {
                    "" | "=" => StructuredNumeric::Quantity {
                        comparator: None,
                        value,
                    },
                    "<" | "<=" | ">" | ">=" => StructuredNumeric::Quantity {
                        comparator: Some(comparator.to_string()),
                        value,
                    },
                    _ => opaque(),
                }
            }
            [lead, n1, separator, n2] if lead.trim().is_empty() => {
                let (Some(a), Some(b)) = (parse_number(n1), parse_number(n2)) else {
                    return opaque();
                };
                match separator.trim() {
                    "-" => StructuredNumeric::Range { low: a, high: b },
                    ":" | "/" => StructuredNumeric::Ratio {
                        numerator: a,
                        denominator: b,
                    },
                    _ => opaque(),
                }
            }
            _ => opaque(),
        }
    }

    pub fn into_value(self, unit: &Quantity) -> ObservationValue {
        let with_unit = |value: f64| Quantity {
            value: Some(value),
            ..unit.clone()
        };
        match self {
            StructuredNumeric::Quantity { comparator, value } => {
                ObservationValue::Quantity(Quantity {
                    comparator,
                    ..with_unit(value)
                })
            }
            StructuredNumeric::Range { low, high } => ObservationValue::Range(Range {
                low: Some(with_unit(low)),
                high: Some(with_unit(high)),
            }),
            StructuredNumeric::Ratio {
                numerator,
                denominator,
            } => ObservationValue::Ratio(Ratio {
                numerator: Some(Quantity::value(numerator)),
                denominator: Some(Quantity::value(denominator)),
            }),
            StructuredNumeric::Opaque(raw) => ObservationValue::String(raw),
        }
    }
}

/// OBX-6 units as a quantity template without a value.
fn unit_template(obx: &Segment) -> Quantity {
    let Some(rep) = obx.first(6) else {
        return Quantity::default();
    };
    let code = non_empty(rep.component(1));
    Quantity {
        unit: non_empty(rep.component(2)).or(code).map(str::to_string),
        code: code.map(str::to_string),
        system: non_empty(rep.component(3)).map(normalize_system),
        ..Default::default()
    }
}

fn string_value(obx: &Segment) -> Option<String> {
    let text = obx
        .repetitions(5)
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.values().join("^"))
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(&text).map(str::to_string)
}

/// OBX-5 interpreted according to the OBX-2 value type.
pub fn observation_value(obx: &Segment) -> Option<ObservationValue> {
    let rep = obx.first(5)?;
    let value_type = obx.value(2).trim().to_ascii_uppercase();
    let as_string = || string_value(obx).map(ObservationValue::String);

    match value_type.as_str() {
        "NM" => match parse_number(rep.component(1)) {
            Some(value) => Some(ObservationValue::Quantity(Quantity {
                value: Some(value),
                ..unit_template(obx)
            })),
            None => as_string(),
        },
        "SN" => {
            Some(StructuredNumeric::parse(rep, obx.raw(5)).into_value(&unit_template(obx)))
        }
        "CE" | "CWE" | "CNE" => codeable_concept(rep).map(ObservationValue::CodeableConcept),
        "DT" => date(rep.component(1))
            .map(ObservationValue::DateTime)
            .or_else(as_string),
        "DTM" | "TS" => date_time(rep.component(1))
            .map(ObservationValue::DateTime)
            .or_else(as_string),
        _ => as_string(),
    }
}

/// OBX-7: `low-high`, `<x` / `<=x` (high bound), `>x` / `>=x` (low bound); the text is kept.
pub fn parse_reference_range(text: &str, unit: &Quantity) -> Option<ObservationReferenceRange> {
    let text = non_empty(text)?;
    let quantity = |v: &str| {
        parse_number(v).map(|value| Quantity {
            value: Some(value),
            ..unit.clone()
        })
    };

    let mut range = ObservationReferenceRange {
        text: Some(text.to_string()),
        ..Default::default()
    };

    if let Some(caps) = RANGE.captures(text) {
        range.low = quantity(&caps[1]);
        range.high = quantity(&caps[2]);
    } else if let Some(caps) = BOUND.captures(text) {
        match &caps[1] {
            "<" | "<=" => range.high = quantity(&caps[2]),
            _ => range.low = quantity(&caps[2]),
        }
    }

    Some(range)
}

/// Ids for the observations of one group, in order: `{order-id}-obx-{OBX-1}`.
///
/// When any OBX-1 in the group is blank or repeats another, every observation of the group is
/// numbered by its 1-based position instead, so ids within a group never collide.
pub fn observation_ids(order_id: &str, observations: &[&Segment]) -> Vec<String> {
    let set_ids: Vec<Option<String>> = observations
        .iter()
        .map(|obx| obx.opt_value(1).map(|set_id| composite_key(&[set_id])))
        .collect();

    let mut seen = HashSet::new();
    let use_set_ids = set_ids
        .iter()
        .all(|set_id| set_id.as_ref().is_some_and(|s| !s.is_empty() && seen.insert(s.clone())));

    if !use_set_ids && !observations.is_empty() {
        tracing::debug!(
            "Order {} has blank or repeated OBX-1 values; numbering observations by position",
            order_id
        );
    }

    set_ids
        .into_iter()
        .enumerate()
        .map(|(index, set_id)| {
            let position = (index + 1).to_string();
            let suffix = match set_id {
                Some(set_id) if use_set_ids => set_id,
                _ => position,
            };
            composite_key(&[order_id, "obx", &suffix])
        })
        .collect()
}

fn interpretation(obx: &Segment) -> Vec<CodeableConcept> {
    obx.repetitions(8)
        .iter()
        .filter_map(|rep| {
            let code = non_empty(rep.component(1))?;
            let mut coding = Coding::new(V2_ABNORMAL_FLAGS, code);
            coding.display = non_empty(rep.component(2)).map(str::to_string);
            Some(CodeableConcept::from_coding(coding))
        })
        .collect()
}

pub fn convert_observation(
    obx: &Segment,
    id: String,
    status: String,
    subject: &SubjectRefs,
    notes: &[&Segment],
) -> Observation {
    let unit = unit_template(obx);
    Observation {
        id,
        status,
        code: codeable_concept_opt(obx.first(3)),
        subject: Some(subject.patient.clone()),
        encounter: subject.encounter.clone(),
        effective_date_time: obx.opt_value(14).and_then(date_time),
        value: observation_value(obx),
        interpretation: interpretation(obx),
        reference_range: parse_reference_range(obx.value(7), &unit)
            .into_iter()
            .collect(),
        note: annotations(notes),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reference;

    fn obx(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    fn sn(value: &str) -> StructuredNumeric {
        let seg = obx(&format!("OBX|1|SN|X||{value}"));
        StructuredNumeric::parse(seg.first(5).unwrap(), seg.raw(5))
    }

    #[test]
    fn test_structured_numeric_shapes() {
        assert_eq!(
            sn(">^90"),
            StructuredNumeric::Quantity {
                comparator: Some(">".to_string()),
                value: 90.0
            }
        );
        assert_eq!(sn("^10^-^20"), StructuredNumeric::Range { low: 10.0, high: 20.0 });
        assert_eq!(
            sn("^1^:^128"),
            StructuredNumeric::Ratio {
                numerator: 1.0,
                denominator: 128.0
            }
        );
        assert_eq!(sn("garbage"), StructuredNumeric::Opaque("garbage".to_string()));
    }

    #[test]
    fn test_structured_numeric_edge_cases() {
        assert_eq!(
            sn("=^5"),
            StructuredNumeric::Quantity {
                comparator: None,
                value: 5.0
            }
        );
        assert_eq!(sn("<>^5"), StructuredNumeric::Opaque("<>^5".to_string()));
        assert_eq!(
            sn("^1^/^2"),
            StructuredNumeric::Ratio {
                numerator: 1.0,
                denominator: 2.0
            }
        );
        assert_eq!(sn("^1^+^2"), StructuredNumeric::Opaque("^1^+^2".to_string()));
        assert_eq!(sn("x^1^-^2"), StructuredNumeric::Opaque("x^1^-^2".to_string()));
    }

    #[test]
    fn test_value_types() {
        let nm = observation_value(&obx("OBX|1|NM|718-7^Hgb^LN||13.5|g/dL^grams per dL^UCUM"));
        let Some(ObservationValue::Quantity(q)) = nm else {
            panic!("expected quantity");
        };
        assert_eq!(q.value, Some(13.5));
        assert_eq!(q.code.as_deref(), Some("g/dL"));
        assert_eq!(q.system.as_deref(), Some("http://unitsofmeasure.org"));

        assert_eq!(
            observation_value(&obx("OBX|1|NM|X||pending")),
            Some(ObservationValue::String("pending".to_string()))
        );
        assert!(matches!(
            observation_value(&obx("OBX|1|CWE|X||POS^Positive^L")),
            Some(ObservationValue::CodeableConcept(_))
        ));
        assert_eq!(
            observation_value(&obx("OBX|1|DT|X||20240102")),
            Some(ObservationValue::DateTime("2024-01-02".to_string()))
        );
        assert_eq!(
            observation_value(&obx("OBX|1|TX|X||line one~line two")),
            Some(ObservationValue::String("line one\nline two".to_string()))
        );
        assert_eq!(observation_value(&obx("OBX|1|ST|X||")), None);
    }

    #[test]
    fn test_reference_ranges() {
        let unit = Quantity::default();
        let range = parse_reference_range("3.5-5.0", &unit).unwrap();
        assert_eq!(range.low.unwrap().value, Some(3.5));
        assert_eq!(range.high.unwrap().value, Some(5.0));

        let upper = parse_reference_range("<200", &unit).unwrap();
        assert!(upper.low.is_none());
        assert_eq!(upper.high.unwrap().value, Some(200.0));

        let lower = parse_reference_range(">= 60", &unit).unwrap();
        assert_eq!(lower.low.unwrap().value, Some(60.0));

        let text = parse_reference_range("negative", &unit).unwrap();
        assert!(text.low.is_none() && text.high.is_none());
        assert_eq!(text.text.as_deref(), Some("negative"));

        assert!(parse_reference_range("", &unit).is_none());
    }

    #[test]
    fn test_observation_ids_use_set_ids_when_distinct() {
        let first = obx("OBX|2|NM|X||1");
        let second = obx("OBX|7|NM|Y||1");
        assert_eq!(
            observation_ids("ord-1", &[&first, &second]),
            vec!["ord-1-obx-2".to_string(), "ord-1-obx-7".to_string()]
        );
        assert!(observation_ids("ord-1", &[]).is_empty());
    }

    #[test]
    fn test_observation_ids_fall_back_to_position() {
        let repeated = [obx("OBX|1|NM|WBC||1"), obx("OBX|1|NM|HGB||2"), obx("OBX|2|NM|PLT||3")];
        let refs: Vec<&Segment> = repeated.iter().collect();
        assert_eq!(
            observation_ids("ord-1", &refs),
            vec![
                "ord-1-obx-1".to_string(),
                "ord-1-obx-2".to_string(),
                "ord-1-obx-3".to_string()
            ]
        );

        let blank = [obx("OBX|4|NM|WBC||1"), obx("OBX||NM|HGB||2")];
        let refs: Vec<&Segment> = blank.iter().collect();
        assert_eq!(
            observation_ids("ord-1", &refs),
            vec!["ord-1-obx-1".to_string(), "ord-1-obx-2".to_string()]
        );
    }

    #[test]
    fn test_convert_observation() {
        let segment = obx("OBX|1|NM|718-7^Hgb^LN||9.1|g/dL|12-16|L^Low|||F|||20240102080000");
        let nte = Segment::parse("NTE|1||Hemolyzed").unwrap();
        let subject = SubjectRefs::new(Reference::to("Patient", "p1"), None);
        let observation = convert_observation(
            &segment,
            "o1".to_string(),
            "final".to_string(),
            &subject,
            &[&nte],
        );
        assert_eq!(observation.reference_range.len(), 1);
        assert_eq!(observation.interpretation[0].first_code(), Some("L"));
        assert_eq!(
            observation.effective_date_time.as_deref(),
            Some("2024-01-02T08:00:00")
        );
        assert_eq!(observation.note[0].text, "Hemolyzed");
        assert_eq!(
            observation.subject.unwrap().reference.as_deref(),
            Some("Patient/p1")
        );
    }
}
