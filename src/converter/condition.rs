use super::SubjectRefs;
use super::datatypes::{codeable_concept_opt, date_time};
use crate::identity::{composite_key, diagnosis_key};
use crate::segment::Segment;
use crate::terminology::tables::{
    CONDITION_CATEGORY, CONDITION_VERIFICATION, diagnosis_verification,
};
use crate::types::{CodeableConcept, Coding, Condition};

/// `{scope}-{code}-{display}`, where scope is the encounter id or else the patient id.
pub fn condition_id(dg1: &Segment, scope: &str) -> String {
    let (code, display) = diagnosis_key(dg1);
    composite_key(&[scope, &code, &display])
}

pub fn convert_condition(dg1: &Segment, id: String, subject: &SubjectRefs) -> Condition {
    let mut code = codeable_concept_opt(dg1.first(3));
    if let Some(description) = dg1.opt_value(4) {
        match code.as_mut() {
            Some(concept) if concept.coding.iter().all(|c| c.display.is_none()) => {
                if let Some(primary) = concept.coding.first_mut() {
                    primary.display = Some(description.to_string());
                }
            }
            Some(_) => {}
            None => {
                code = Some(CodeableConcept {
                    coding: Vec::new(),
                    text: Some(description.to_string()),
                })
            }
        }
    }

    Condition {
        id,
        clinical_status: None,
        verification_status: diagnosis_verification(dg1.value(6)).map(|status| {
            CodeableConcept::from_coding(Coding::new(CONDITION_VERIFICATION, status))
        }),
        category: vec![CodeableConcept::from_coding(
            Coding::new(CONDITION_CATEGORY, "encounter-diagnosis")
                .with_display("Encounter Diagnosis"),
        )],
        code,
        subject: Some(subject.patient.clone()),
        encounter: subject.encounter.clone(),
        recorded_date: dg1.opt_value(5).and_then(date_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reference;

    fn dg1(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    #[test]
    fn test_condition_id_scope() {
        let seg = dg1("DG1|1||E11.9^Type 2 diabetes^I10||20240101|F");
        assert_eq!(condition_id(&seg, "enc-1"), "enc-1-e11-9-type-2-diabetes");
    }

    #[test]
    fn test_convert_condition() {
        let seg = dg1("DG1|1||E11.9^^I10|Diabetes mellitus|20240101|A");
        let subject = SubjectRefs::new(
            Reference::to("Patient", "p1"),
            Some(Reference::to("Encounter", "e1")),
        );
        let condition = convert_condition(&seg, "c1".to_string(), &subject);

        let code = condition.code.unwrap();
        assert_eq!(
            code.coding[0].system.as_deref(),
            Some("http://hl7.org/fhir/sid/icd-10")
        );
        assert_eq!(code.coding[0].display.as_deref(), Some("Diabetes mellitus"));
        assert_eq!(
            condition.verification_status.unwrap().first_code(),
            Some("provisional")
        );
        assert_eq!(
            condition.category[0].first_code(),
            Some("encounter-diagnosis")
        );
        assert_eq!(condition.recorded_date.as_deref(), Some("2024-01-01"));
        assert!(condition.encounter.is_some());
    }
}
