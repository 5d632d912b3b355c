use super::datatypes::{codeable_concept_opt, date};
use crate::identity::composite_key;
use crate::segment::Segment;
use crate::types::{Coverage, Identifier, Period, Reference};

/// `{patient-id}-{IN1-3.1 or IN1-4.1}`; `None` when the IN1 names no payor.
pub fn coverage_id(in1: &Segment, patient_id: &str) -> Option<String> {
    let payor = in1
        .opt_component(3, 1)
        .or_else(|| in1.opt_component(4, 1))?;
    Some(composite_key(&[patient_id, payor]))
}

pub fn convert_coverage(in1: &Segment, id: String, beneficiary: &Reference) -> Coverage {
    let payor = in1
        .opt_component(4, 1)
        .or_else(|| in1.opt_component(3, 1))
        .map(Reference::display);

    Coverage {
        id,
        identifier: in1
            .opt_value(2)
            .map(|plan| Identifier {
                value: Some(plan.to_string()),
                ..Default::default()
            })
            .into_iter()
            .collect(),
        status: "active".to_string(),
        type_: codeable_concept_opt(in1.first(15)),
        subscriber_id: in1
            .opt_value(36)
            .or_else(|| in1.opt_value(49))
            .map(str::to_string),
        beneficiary: Some(beneficiary.clone()),
        period: Period::from_bounds(
            in1.opt_value(12).and_then(date),
            in1.opt_value(13).and_then(date),
        ),
        payor: payor.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in1(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    #[test]
    fn test_coverage_id() {
        assert_eq!(
            coverage_id(&in1("IN1|1|PLAN1|ACME01|Acme Insurance"), "p1").as_deref(),
            Some("p1-acme01")
        );
        assert_eq!(
            coverage_id(&in1("IN1|1|PLAN1||Acme Insurance"), "p1").as_deref(),
            Some("p1-acme-insurance")
        );
        assert!(coverage_id(&in1("IN1|1|PLAN1"), "p1").is_none());
    }

    #[test]
    fn test_convert_coverage() {
        let seg = in1("IN1|1|PLAN1|ACME01|Acme Insurance||||||||20240101|20241231");
        let coverage = convert_coverage(
            &seg,
            "p1-acme01".to_string(),
            &Reference::to("Patient", "p1"),
        );
        assert_eq!(coverage.status, "active");
        assert_eq!(coverage.payor[0].display.as_deref(), Some("Acme Insurance"));
        let period = coverage.period.unwrap();
        assert_eq!(period.start.as_deref(), Some("2024-01-01"));
        assert_eq!(period.end.as_deref(), Some("2024-12-31"));
        assert_eq!(coverage.identifier[0].value.as_deref(), Some("PLAN1"));
    }
}
