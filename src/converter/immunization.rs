use super::SubjectRefs;
use super::datatypes::{codeable_concept_opt, date, date_time};
use super::observation::parse_number;
use crate::identity::{EntityIdentifier, build_id, composite_key};
use crate::segment::Segment;
use crate::terminology::tables::UCUM;
use crate::types::{Immunization, Quantity, Reference};

/// Immunization id from ORC-3, then ORC-2, else `{patient-id}-{vaccine}-{administered at}`.
pub fn immunization_id(orc: &Segment, rxa: &Segment, patient_id: &str) -> String {
    let candidates = [
        EntityIdentifier::ei_field(orc, 3),
        EntityIdentifier::ei_field(orc, 2),
    ];
    build_id(&candidates)
        .unwrap_or_else(|_| composite_key(&[patient_id, rxa.component(5, 1), rxa.value(3)]))
}

/// RXA-21 action code `D` marks the administration record as deleted.
pub fn is_deleted(rxa: &Segment) -> bool {
    rxa.value(21).trim().eq_ignore_ascii_case("D")
}

/// RXA-6 of 999 means "unknown amount".
fn dose_quantity(rxa: &Segment) -> Option<Quantity> {
    let value = parse_number(rxa.value(6)).filter(|v| (*v - 999.0).abs() > f64::EPSILON)?;
    let code = rxa.opt_component(7, 1);
    Some(Quantity {
        value: Some(value),
        unit: rxa.opt_component(7, 2).or(code).map(str::to_string),
        code: code.map(str::to_string),
        system: code.map(|_| UCUM.to_string()),
        ..Default::default()
    })
}

pub fn convert_immunization(
    rxa: &Segment,
    id: String,
    status: String,
    subject: &SubjectRefs,
) -> Immunization {
    let status_reason = if status == "not-done" {
        codeable_concept_opt(rxa.first(18))
    } else {
        None
    };

    Immunization {
        id,
        identifier: Vec::new(),
        status,
        status_reason,
        vaccine_code: codeable_concept_opt(rxa.first(5)),
        patient: Some(subject.patient.clone()),
        encounter: subject.encounter.clone(),
        occurrence_date_time: rxa.opt_value(3).and_then(date_time),
        manufacturer: rxa
            .opt_component(17, 2)
            .or_else(|| rxa.opt_component(17, 1))
            .map(Reference::display),
        lot_number: rxa.opt_value(15).map(str::to_string),
        expiration_date: rxa.opt_value(16).and_then(date),
        dose_quantity: dose_quantity(rxa),
    }
}
