// HL7v2 composite datatypes to FHIR datatypes

use std::sync::LazyLock;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use regex::Regex;

use crate::segment::{Repetition, non_empty};
use crate::terminology::tables::{V2_IDENTIFIER_TYPE, normalize_system};
use crate::types::{Address, CodeableConcept, Coding, ContactPoint, HumanName, Identifier};

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(\d{2})?(\d{2})?(?:(\d{2})(\d{2})?(\d{2})?(?:\.(\d{1,4}))?)?([+-]\d{4})?$",
    )
    .expect("valid timestamp regex")
});

fn coding_triplet(rep: &Repetition, first: usize) -> Option<Coding> {
    let code = non_empty(rep.component(first))?;
    Some(Coding {
        system: non_empty(rep.component(first + 2)).map(normalize_system),
        code: Some(code.to_string()),
        display: non_empty(rep.component(first + 1)).map(str::to_string),
    })
}

/// CWE/CE/CNE: primary triplet in components 1-3, alternate in 4-6.
///
/// A value with only a text component becomes a text-only concept.
pub fn codeable_concept(rep: &Repetition) -> Option<CodeableConcept> {
    let coding: Vec<Coding> = [1, 4]
        .into_iter()
        .filter_map(|first| coding_triplet(rep, first))
        .collect();

    if coding.is_empty() {
        let text = non_empty(rep.component(2)).or_else(|| non_empty(rep.component(5)))?;
        return Some(CodeableConcept {
            coding,
            text: Some(text.to_string()),
        });
    }

    Some(CodeableConcept { coding, text: None })
}

pub fn codeable_concept_opt(rep: Option<&Repetition>) -> Option<CodeableConcept> {
    rep.and_then(codeable_concept)
}

/// CX: value CX.1, system CX.4.1, type CX.5 (v2-0203).
pub fn identifier(rep: &Repetition) -> Option<Identifier> {
    let value = non_empty(rep.component(1))?;
    let type_ = non_empty(rep.component(5))
        .map(|code| CodeableConcept::from_coding(Coding::new(V2_IDENTIFIER_TYPE, code)));

    Some(Identifier {
        type_,
        system: non_empty(rep.subcomponent(4, 1)).map(str::to_string),
        value: Some(value.to_string()),
    })
}

/// EI as an identifier: entity id in EI.1, namespace in EI.2, tagged with an identifier type.
pub fn entity_identifier(rep: &Repetition, type_code: &str) -> Option<Identifier> {
    let value = non_empty(rep.component(1))?;
    Some(Identifier {
        type_: Some(CodeableConcept::from_coding(Coding::new(
            V2_IDENTIFIER_TYPE,
            type_code,
        ))),
        system: non_empty(rep.component(2)).map(str::to_string),
        value: Some(value.to_string()),
    })
}

fn name_use(code: &str) -> Option<&'static str> {
    match code {
        "L" => Some("official"),
        "D" => Some("usual"),
        "M" => Some("maiden"),
        "N" => Some("nickname"),
        "A" => Some("anonymous"),
        "T" => Some("temp"),
        _ => None,
    }
}

/// XPN: family, given, middle (as a second given), suffix, prefix, use from XPN.7.
pub fn human_name(rep: &Repetition) -> Option<HumanName> {
    let family = non_empty(rep.subcomponent(1, 1)).map(str::to_string);
    let given: Vec<String> = [2, 3]
        .into_iter()
        .filter_map(|c| non_empty(rep.component(c)))
        .map(str::to_string)
        .collect();

    if family.is_none() && given.is_empty() {
        return None;
    }

    Some(HumanName {
        use_: name_use(rep.component(7).trim()).map(str::to_string),
        family,
        given,
        prefix: non_empty(rep.component(5)).map(str::to_string).into_iter().collect(),
        suffix: non_empty(rep.component(4)).map(str::to_string).into_iter().collect(),
    })
}

/// XAD: street lines, city, state, postal code, country, use from XAD.7.
pub fn address(rep: &Repetition) -> Option<Address> {
    let line: Vec<String> = [rep.subcomponent(1, 1), rep.component(2)]
        .into_iter()
        .filter_map(non_empty)
        .map(str::to_string)
        .collect();
    let address = Address {
        use_: match rep.component(7).trim() {
            "H" => Some("home".to_string()),
            "B" | "O" => Some("work".to_string()),
            "C" => Some("temp".to_string()),
            _ => None,
        },
        line,
        city: non_empty(rep.component(3)).map(str::to_string),
        state: non_empty(rep.component(4)).map(str::to_string),
        postal_code: non_empty(rep.component(5)).map(str::to_string),
        country: non_empty(rep.component(6)).map(str::to_string),
    };

    let empty = address.line.is_empty()
        && address.city.is_none()
        && address.state.is_none()
        && address.postal_code.is_none()
        && address.country.is_none();
    (!empty).then_some(address)
}

/// XTN: telephone or email. `default_use` applies when XTN.2 carries no use code.
pub fn contact_point(rep: &Repetition, default_use: Option<&str>) -> Option<ContactPoint> {
    let equipment = rep.component(3).trim();
    let (system, value) = match equipment {
        "Internet" | "X.400" | "NET" => ("email", non_empty(rep.component(4))?.to_string()),
        _ => {
            let value = match non_empty(rep.component(1)) {
                Some(number) => number.to_string(),
                None => {
                    let local = non_empty(rep.component(7))?;
                    match non_empty(rep.component(6)) {
                        Some(area) => format!("({area}) {local}"),
                        None => local.to_string(),
                    }
                }
            };
            let system = match equipment {
                "FX" => "fax",
                "BP" => "pager",
                _ => "phone",
            };
            (system, value)
        }
    };

    let use_ = match rep.component(2).trim() {
        "PRN" | "ORN" | "VHN" => Some("home"),
        "WPN" => Some("work"),
        _ if equipment == "CP" => Some("mobile"),
        _ => default_use,
    };

    Some(ContactPoint {
        system: Some(system.to_string()),
        value: Some(value),
        use_: use_.map(str::to_string),
    })
}

/// XCN as display text: "prefix given family suffix", or the id number when there is no name.
pub fn person_display(rep: &Repetition) -> Option<String> {
    let parts: Vec<&str> = [
        rep.component(6),
        rep.component(3),
        rep.subcomponent(2, 1),
        rep.component(5),
    ]
    .into_iter()
    .filter_map(non_empty)
    .collect();

    if parts.is_empty() {
        return non_empty(rep.component(1)).map(str::to_string);
    }
    Some(parts.join(" "))
}

/// TS/DTM → FHIR dateTime, keeping the precision the sender used.
///
/// Times are padded to seconds, fractional seconds are kept and `+zzzz` offsets become
/// `+zz:zz`. Returns `None` for anything that is not a valid timestamp.
pub fn date_time(value: &str) -> Option<String> {
    let value = value.trim();
    let caps = TIMESTAMP.captures(value)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let month = number(2);
    let day = number(3);
    NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?;

    let mut out = format!("{year:04}");
    let Some(month) = month else {
        return Some(out);
    };
    out.push_str(&format!("-{month:02}"));
    let Some(day) = day else {
        return Some(out);
    };
    out.push_str(&format!("-{day:02}"));

    let Some(hour) = number(4) else {
        return Some(out);
    };
    let minute = number(5).unwrap_or(0);
    let second = number(6).unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, second)?;
    out.push_str(&format!("T{hour:02}:{minute:02}:{second:02}"));
    if let Some(fraction) = caps.get(7) {
        out.push('.');
        out.push_str(fraction.as_str());
    }

    if let Some(offset) = caps.get(8) {
        let raw = offset.as_str();
        let sign = if raw.starts_with('-') { -1 } else { 1 };
        let hours: i32 = raw[1..3].parse().ok()?;
        let minutes: i32 = raw[3..5].parse().ok()?;
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
        out.push_str(&format!("{}:{}", &raw[..3], &raw[3..5]));
    }

    Some(out)
}

/// DT → FHIR date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`); a time part is dropped.
pub fn date(value: &str) -> Option<String> {
    let value = value.trim();
    let digits: String = value.chars().take_while(char::is_ascii_digit).take(8).collect();
    if !matches!(digits.len(), 4 | 6 | 8) {
        return None;
    }
    let full = date_time(&digits)?;
    Some(full)
}
