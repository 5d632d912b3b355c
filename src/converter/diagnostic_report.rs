use super::datatypes::{codeable_concept_opt, date_time, entity_identifier};
use super::{SubjectRefs, note_text};
use crate::segment::Segment;
use crate::types::{DiagnosticReport, Reference};

/// OBR → DiagnosticReport. Order-level notes become the conclusion.
pub fn convert_diagnostic_report(
    obr: &Segment,
    id: String,
    status: String,
    subject: &SubjectRefs,
    notes: &[&Segment],
    results: Vec<Reference>,
) -> DiagnosticReport {
    let conclusion = notes
        .iter()
        .filter_map(|nte| note_text(nte))
        .collect::<Vec<_>>()
        .join("\n");

    DiagnosticReport {
        id,
        identifier: [
            obr.first(2).and_then(|rep| entity_identifier(rep, "PLAC")),
            obr.first(3).and_then(|rep| entity_identifier(rep, "FILL")),
        ]
        .into_iter()
        .flatten()
        .collect(),
        status,
        code: codeable_concept_opt(obr.first(4)),
        subject: Some(subject.patient.clone()),
        encounter: subject.encounter.clone(),
        effective_date_time: obr.opt_value(7).and_then(date_time),
        issued: obr.opt_value(22).and_then(date_time),
        result: results,
        conclusion: (!conclusion.is_empty()).then_some(conclusion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_conclusion_and_results() {
        let obr = Segment::parse(
            "OBR|1|PL1|FL1|LIPID^Lipid panel^L|||20240301090000|||||||||||||||20240301120000|||F",
        )
        .unwrap();
        let first = Segment::parse("NTE|1||Sample slightly lipemic").unwrap();
        let second = Segment::parse("NTE|2||Repeat advised").unwrap();
        let subject = SubjectRefs::new(Reference::to("Patient", "p1"), None);

        let report = convert_diagnostic_report(
            &obr,
            "pl1".to_string(),
            "final".to_string(),
            &subject,
            &[&first, &second],
            vec![Reference::to("Observation", "pl1-obx-1")],
        );

        assert_eq!(
            report.conclusion.as_deref(),
            Some("Sample slightly lipemic\nRepeat advised")
        );
        assert_eq!(report.identifier.len(), 2);
        assert_eq!(report.result.len(), 1);
        assert_eq!(
            report.effective_date_time.as_deref(),
            Some("2024-03-01T09:00:00")
        );
        assert_eq!(report.issued.as_deref(), Some("2024-03-01T12:00:00"));
    }
}
