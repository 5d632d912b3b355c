use super::datatypes::{date_time, identifier};
use crate::identity::{EntityIdentifier, build_id, composite_key};
use crate::segment::Segment;
use crate::terminology::tables::{V3_ACT_CODE, encounter_class_display};
use crate::types::{Coding, Encounter, Period, Reference};

/// A PV1 with neither a patient class nor a visit number carries no encounter.
pub fn has_encounter(pv1: &Segment) -> bool {
    !(pv1.is_field_empty(2) && pv1.is_field_empty(19))
}

/// Encounter id from the visit number (PV1-19), else `{patient-id}-{admit time}`.
pub fn encounter_id(pv1: &Segment, patient_id: &str) -> Option<String> {
    if let Some(rep) = pv1.first(19) {
        let visit = EntityIdentifier::new(rep.component(1).trim(), Some(rep.subcomponent(4, 1)));
        if let Ok(id) = build_id([&visit]) {
            return Some(id);
        }
    }

    pv1.opt_value(44)
        .map(|admitted| composite_key(&[patient_id, admitted]))
}

/// Build the encounter. `class` is the already-resolved v3 ActCode, if any.
pub fn convert_encounter(
    pv1: &Segment,
    id: String,
    class: Option<String>,
    patient: &Reference,
) -> Encounter {
    let discharged = pv1.opt_value(45).and_then(date_time);
    let status = if pv1.is_field_empty(45) {
        "in-progress"
    } else {
        "finished"
    };

    Encounter {
        id,
        identifier: pv1.first(19).and_then(identifier).into_iter().collect(),
        status: status.to_string(),
        class: class.map(|code| {
            let display = encounter_class_display(&code);
            let coding = Coding::new(V3_ACT_CODE, code);
            match display {
                Some(display) => coding.with_display(display),
                None => coding,
            }
        }),
        subject: Some(patient.clone()),
        period: Period::from_bounds(pv1.opt_value(44).and_then(date_time), discharged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pv1(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    fn pv1_with(class: &str, visit: &str, admit: &str, discharge: &str) -> Segment {
        let mut fields = vec![""; 45];
        fields[1] = class;
        fields[18] = visit;
        fields[43] = admit;
        fields[44] = discharge;
        pv1(&format!("PV1|{}", fields.join("|")))
    }

    #[test]
    fn test_absent_encounter() {
        assert!(!has_encounter(&pv1("PV1|1")));
        assert!(has_encounter(&pv1("PV1|1|I")));
    }

    #[test]
    fn test_id_from_visit_number() {
        let seg = pv1_with("I", "V100^^^HOSP", "", "");
        assert_eq!(encounter_id(&seg, "p1").as_deref(), Some("v100-hosp"));
    }

    #[test]
    fn test_id_from_admit_time() {
        let seg = pv1_with("E", "", "20240101120000", "");
        assert_eq!(
            encounter_id(&seg, "p1").as_deref(),
            Some("p1-20240101120000")
        );
        assert!(encounter_id(&pv1_with("E", "", "", ""), "p1").is_none());
    }

    #[test]
    fn test_status_and_class() {
        let seg = pv1_with("I", "V1", "20240101", "20240105");
        let encounter = convert_encounter(
            &seg,
            "v1".to_string(),
            Some("IMP".to_string()),
            &Reference::to("Patient", "p1"),
        );
        assert_eq!(encounter.status, "finished");
        let class = encounter.class.unwrap();
        assert_eq!(class.code.as_deref(), Some("IMP"));
        assert_eq!(class.display.as_deref(), Some("inpatient encounter"));
        let period = encounter.period.unwrap();
        assert_eq!(period.start.as_deref(), Some("2024-01-01"));
        assert_eq!(period.end.as_deref(), Some("2024-01-05"));

        let open = convert_encounter(
            &pv1_with("I", "V1", "", ""),
            "v1".to_string(),
            None,
            &Reference::to("Patient", "p1"),
        );
        assert_eq!(open.status, "in-progress");
        assert!(open.period.is_none());
    }
}
