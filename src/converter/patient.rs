use super::datatypes::{address, contact_point, date, date_time, human_name, identifier};
use crate::identity::{EntityIdentifier, IdentityError, build_id};
use crate::segment::Segment;
use crate::terminology::tables::administrative_gender;
use crate::types::Patient;

/// Patient id from PID-2, then each PID-3 repetition.
pub fn patient_id(pid: &Segment) -> Result<String, IdentityError> {
    let candidates: Vec<EntityIdentifier> = pid
        .first(2)
        .into_iter()
        .chain(pid.repetitions(3).iter())
        .map(|rep| EntityIdentifier::new(rep.component(1).trim(), Some(rep.subcomponent(4, 1))))
        .collect();
    build_id(&candidates)
}

pub fn convert_patient(pid: &Segment, id: String) -> Patient {
    let telecom = pid
        .repetitions(13)
        .iter()
        .filter_map(|rep| contact_point(rep, Some("home")))
        .chain(
            pid.repetitions(14)
                .iter()
                .filter_map(|rep| contact_point(rep, Some("work"))),
        )
        .collect();

    let deceased_date_time = pid.opt_value(29).and_then(date_time);
    let deceased_boolean = if deceased_date_time.is_some() {
        None
    } else {
        match pid.value(30).trim() {
            "Y" => Some(true),
            "N" => Some(false),
            _ => None,
        }
    };

    Patient {
        id,
        identifier: pid.repetitions(3).iter().filter_map(identifier).collect(),
        name: pid.repetitions(5).iter().filter_map(human_name).collect(),
        telecom,
        gender: pid
            .opt_value(8)
            .map(|code| administrative_gender(code).to_string()),
        birth_date: pid.opt_value(7).and_then(date),
        deceased_boolean,
        deceased_date_time,
        address: pid.repetitions(11).iter().filter_map(address).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(line: &str) -> Segment {
        Segment::parse(line).unwrap()
    }

    #[test]
    fn test_patient_id_prefers_pid2() {
        let seg = pid("PID|1|EXT-9|MRN1^^^HOSP^MR");
        assert_eq!(patient_id(&seg).unwrap(), "ext-9");
    }

    #[test]
    fn test_patient_id_from_pid3_with_authority() {
        let seg = pid("PID|1||^^^X~MRN1^^^HOSP&1.2&ISO^MR");
        assert_eq!(patient_id(&seg).unwrap(), "mrn1-hosp");
    }

    #[test]
    fn test_patient_without_identifier() {
        let seg = pid("PID|1||||Doe^John");
        assert_eq!(
            patient_id(&seg).unwrap_err(),
            IdentityError::NoUsableIdentifier
        );
    }

    #[test]
    fn test_convert_patient_demographics() {
        let seg = pid(
            "PID|1||MRN1^^^HOSP^MR||Doe^Jane^A||19800115|F|||12 Oak Rd^^Town^CA^90000||^PRN^PH^^^555^1112222|^WPN^PH^^^555^3334444||||||||||||||||Y",
        );
        let patient = convert_patient(&seg, "mrn1-hosp".to_string());
        assert_eq!(patient.gender.as_deref(), Some("female"));
        assert_eq!(patient.birth_date.as_deref(), Some("1980-01-15"));
        assert_eq!(patient.name[0].family.as_deref(), Some("Doe"));
        assert_eq!(patient.address[0].city.as_deref(), Some("Town"));
        assert_eq!(patient.telecom.len(), 2);
        assert_eq!(patient.telecom[1].use_.as_deref(), Some("work"));
        assert_eq!(patient.identifier[0].value.as_deref(), Some("MRN1"));
        assert_eq!(patient.deceased_boolean, Some(true));
    }

    #[test]
    fn test_unmapped_gender_is_unknown() {
        let seg = pid("PID|1||MRN1||Doe^J||19800115|Z");
        assert_eq!(
            convert_patient(&seg, "x".to_string()).gender.as_deref(),
            Some("unknown")
        );
    }
}
