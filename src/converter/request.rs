use super::datatypes::{codeable_concept_opt, date_time, entity_identifier, person_display};
use super::observation::parse_number;
use super::{SubjectRefs, annotations};
use crate::identity::{EntityIdentifier, IdentityError, build_id};
use crate::segment::Segment;
use crate::terminology::tables::{UCUM, order_control_status};
use crate::types::{
    DispenseRequest, DoseAndRate, Dosage, Identifier, MedicationRequest, Quantity, Range,
    Reference, ServiceRequest,
};

/// Order id from ORC-2, ORC-3, OBR-2, OBR-3 (EI value plus namespace), first usable wins.
pub fn order_id(order: Option<&Segment>, request: Option<&Segment>) -> Result<String, IdentityError> {
    let candidates = [
        order.map(|orc| EntityIdentifier::ei_field(orc, 2)),
        order.map(|orc| EntityIdentifier::ei_field(orc, 3)),
        request.map(|obr| EntityIdentifier::ei_field(obr, 2)),
        request.map(|obr| EntityIdentifier::ei_field(obr, 3)),
    ];
    build_id(candidates.iter().flatten())
}

/// Request status when ORC-5 is empty: ORC-1 through the order-control table, else `unknown`.
pub fn order_control_fallback(orc: &Segment) -> String {
    let control = orc.value(1).trim().to_ascii_uppercase();
    order_control_status(&control)
        .unwrap_or("unknown")
        .to_string()
}

/// MedicationRequest has no `revoked`; everything else carries over.
pub fn medication_request_status(request_status: &str) -> &str {
    match request_status {
        "revoked" => "cancelled",
        other => other,
    }
}

fn order_identifiers(orc: &Segment, obr: Option<&Segment>) -> Vec<Identifier> {
    let placer = orc.first(2).or_else(|| obr.and_then(|s| s.first(2)));
    let filler = orc.first(3).or_else(|| obr.and_then(|s| s.first(3)));
    [
        placer.and_then(|rep| entity_identifier(rep, "PLAC")),
        filler.and_then(|rep| entity_identifier(rep, "FILL")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn requester(orc: &Segment, fallback: Option<&Segment>) -> Option<Reference> {
    orc.first(12)
        .or_else(|| fallback.and_then(|obr| obr.first(16)))
        .and_then(person_display)
        .map(Reference::display)
}

/// Everything a request resource links to besides the segments themselves.
#[derive(Debug, Clone)]
pub struct RequestLinks<'a> {
    pub subject: &'a SubjectRefs,
    pub reasons: Vec<Reference>,
    pub notes: &'a [&'a Segment],
}

pub fn convert_service_request(
    orc: &Segment,
    obr: &Segment,
    id: String,
    status: String,
    links: &RequestLinks<'_>,
) -> ServiceRequest {
    ServiceRequest {
        id,
        identifier: order_identifiers(orc, Some(obr)),
        status,
        intent: "order".to_string(),
        code: codeable_concept_opt(obr.first(4)),
        subject: Some(links.subject.patient.clone()),
        encounter: links.subject.encounter.clone(),
        occurrence_date_time: obr.opt_value(7).and_then(date_time),
        authored_on: orc.opt_value(9).and_then(date_time),
        requester: requester(orc, Some(obr)),
        reason_reference: links.reasons.clone(),
        note: annotations(links.notes),
    }
}

fn units(rxo: &Segment, field: usize) -> Quantity {
    let code = rxo.opt_component(field, 1);
    let system = rxo.opt_component(field, 3);
    Quantity {
        unit: rxo
            .opt_component(field, 2)
            .or(code)
            .map(str::to_string),
        code: code.map(str::to_string),
        system: match system {
            Some(s) if s.eq_ignore_ascii_case("UCUM") => Some(UCUM.to_string()),
            Some(s) => Some(s.to_string()),
            None => None,
        },
        ..Default::default()
    }
}

fn dosage(rxo: &Segment) -> Option<Dosage> {
    let unit = units(rxo, 4);
    let quantity = |field: usize| {
        parse_number(rxo.value(field)).map(|value| Quantity {
            value: Some(value),
            ..unit.clone()
        })
    };

    let dose = match (quantity(2), quantity(3)) {
        (Some(low), Some(high)) => DoseAndRate {
            dose_quantity: None,
            dose_range: Some(Range {
                low: Some(low),
                high: Some(high),
            }),
        },
        (Some(single), None) | (None, Some(single)) => DoseAndRate {
            dose_quantity: Some(single),
            dose_range: None,
        },
        (None, None) => return None,
    };

    Some(Dosage {
        text: rxo.opt_component(7, 2).map(str::to_string),
        dose_and_rate: vec![dose],
    })
}

fn dispense_request(rxo: &Segment) -> Option<DispenseRequest> {
    let quantity = parse_number(rxo.value(11)).map(|value| Quantity {
        value: Some(value),
        ..units(rxo, 12)
    });
    let number_of_repeats_allowed = rxo.opt_value(13).and_then(|v| v.parse::<u32>().ok());

    (quantity.is_some() || number_of_repeats_allowed.is_some()).then_some(DispenseRequest {
        quantity,
        number_of_repeats_allowed,
    })
}

/// `status` is the request status; it is narrowed with [`medication_request_status`].
pub fn convert_medication_request(
    orc: &Segment,
    rxo: &Segment,
    id: String,
    status: &str,
    links: &RequestLinks<'_>,
) -> MedicationRequest {
    MedicationRequest {
        id,
        identifier: order_identifiers(orc, None),
        status: medication_request_status(status).to_string(),
        intent: "order".to_string(),
        medication_codeable_concept: codeable_concept_opt(rxo.first(1)),
        subject: Some(links.subject.patient.clone()),
        encounter: links.subject.encounter.clone(),
        authored_on: orc.opt_value(9).and_then(date_time),
        requester: requester(orc, None),
        reason_reference: links.reasons.clone(),
        note: annotations(links.notes),
        dosage_instruction: dosage(rxo).into_iter().collect(),
        dispense_request: dispense_request(rxo),
    }
}
