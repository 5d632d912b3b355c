//! Static HL7v2 → FHIR coding tables.
//!
//! These encode the v2-to-FHIR concept maps the converter implements. They are plain match
//! dispatch, versioned with the code, and never changed at runtime.

pub const V2_ORDER_STATUS: &str = "http://terminology.hl7.org/CodeSystem/v2-0038";
pub const V2_ORDER_CONTROL: &str = "http://terminology.hl7.org/CodeSystem/v2-0119";
pub const V2_OBSERVATION_STATUS: &str = "http://terminology.hl7.org/CodeSystem/v2-0085";
pub const V2_RESULT_STATUS: &str = "http://terminology.hl7.org/CodeSystem/v2-0123";
pub const V2_PATIENT_CLASS: &str = "http://terminology.hl7.org/CodeSystem/v2-0004";
pub const V2_COMPLETION_STATUS: &str = "http://terminology.hl7.org/CodeSystem/v2-0322";
pub const V2_ABNORMAL_FLAGS: &str = "http://terminology.hl7.org/CodeSystem/v2-0078";
pub const V2_IDENTIFIER_TYPE: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";
pub const V3_ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
pub const CONDITION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/condition-category";
pub const CONDITION_CLINICAL: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";
pub const CONDITION_VERIFICATION: &str =
    "http://terminology.hl7.org/CodeSystem/condition-ver-status";
pub const UCUM: &str = "http://unitsofmeasure.org";

/// `ServiceRequest.status` (request-status).
pub const REQUEST_STATUS: &[&str] = &[
    "draft",
    "active",
    "on-hold",
    "revoked",
    "completed",
    "entered-in-error",
    "unknown",
];

/// `Observation.status` (observation-status).
pub const OBSERVATION_STATUS: &[&str] = &[
    "registered",
    "preliminary",
    "final",
    "amended",
    "corrected",
    "cancelled",
    "entered-in-error",
    "unknown",
];

/// `DiagnosticReport.status` (diagnostic-report-status).
pub const DIAGNOSTIC_REPORT_STATUS: &[&str] = &[
    "registered",
    "partial",
    "preliminary",
    "final",
    "amended",
    "corrected",
    "appended",
    "cancelled",
    "entered-in-error",
    "unknown",
];

/// `Encounter.class` (v3 ActEncounterCode).
pub const ENCOUNTER_CLASS: &[&str] = &[
    "AMB", "EMER", "FLD", "HH", "IMP", "ACUTE", "NONAC", "OBSENC", "PRENC", "SS", "VR",
];

/// `Immunization.status` (immunization-status).
pub const IMMUNIZATION_STATUS: &[&str] = &["completed", "entered-in-error", "not-done"];

/// ORC-5 order status → request status.
pub fn order_status(code: &str) -> Option<&'static str> {
    match code {
        "A" | "IP" | "SC" => Some("active"),
        "CA" | "DC" | "RP" => Some("revoked"),
        "CM" => Some("completed"),
        "ER" => Some("entered-in-error"),
        "HD" => Some("on-hold"),
        _ => None,
    }
}

/// ORC-1 order control → request status; only consulted when ORC-5 is empty.
pub fn order_control_status(code: &str) -> Option<&'static str> {
    match code {
        "NW" | "OK" | "SC" | "XO" | "XR" | "RL" | "RO" | "RU" | "SN" | "NA" => Some("active"),
        "CA" | "CR" | "OC" | "DC" | "DR" | "OD" | "RP" => Some("revoked"),
        "HD" | "HR" | "OH" => Some("on-hold"),
        "DE" => Some("entered-in-error"),
        _ => None,
    }
}

/// OBX-11 observation result status.
pub fn observation_status(code: &str) -> Option<&'static str> {
    match code {
        "C" => Some("corrected"),
        "D" | "W" => Some("entered-in-error"),
        "F" | "U" => Some("final"),
        "I" | "O" => Some("registered"),
        "N" | "X" => Some("cancelled"),
        "P" | "R" | "S" => Some("preliminary"),
        "A" | "B" => Some("amended"),
        _ => None,
    }
}

/// OBR-25 result status → diagnostic report status.
pub fn diagnostic_report_status(code: &str) -> Option<&'static str> {
    match code {
        "O" | "I" | "S" => Some("registered"),
        "A" | "R" => Some("partial"),
        "P" => Some("preliminary"),
        "C" | "M" => Some("corrected"),
        "F" => Some("final"),
        "X" => Some("cancelled"),
        _ => None,
    }
}

/// PV1-2 patient class → encounter class.
pub fn patient_class(code: &str) -> Option<&'static str> {
    match code {
        "E" => Some("EMER"),
        "I" | "B" => Some("IMP"),
        "O" | "R" => Some("AMB"),
        "P" => Some("PRENC"),
        _ => None,
    }
}

pub fn encounter_class_display(code: &str) -> Option<&'static str> {
    match code {
        "AMB" => Some("ambulatory"),
        "EMER" => Some("emergency"),
        "FLD" => Some("field"),
        "HH" => Some("home health"),
        "IMP" => Some("inpatient encounter"),
        "ACUTE" => Some("inpatient acute"),
        "NONAC" => Some("inpatient non-acute"),
        "OBSENC" => Some("observation encounter"),
        "PRENC" => Some("pre-admission"),
        "SS" => Some("short stay"),
        "VR" => Some("virtual"),
        _ => None,
    }
}

/// RXA-20 completion status → immunization status.
pub fn immunization_status(code: &str) -> Option<&'static str> {
    match code {
        "CP" | "PA" => Some("completed"),
        "RE" | "NA" => Some("not-done"),
        _ => None,
    }
}

/// PID-8 administrative sex.
pub fn administrative_gender(code: &str) -> &'static str {
    match code.trim().to_ascii_uppercase().as_str() {
        "M" => "male",
        "F" => "female",
        "O" | "A" | "N" => "other",
        _ => "unknown",
    }
}

/// DG1-6 diagnosis type → condition verification status.
pub fn diagnosis_verification(code: &str) -> Option<&'static str> {
    match code.trim().to_ascii_uppercase().as_str() {
        "A" | "W" => Some("provisional"),
        "F" => Some("confirmed"),
        _ => None,
    }
}

/// Canonical URI for a coding system name as senders write it in CWE.3.
///
/// Unknown names are returned unchanged.
pub fn normalize_system(system: &str) -> String {
    let trimmed = system.trim();
    let canonical = match trimmed.to_ascii_uppercase().as_str() {
        "LN" | "LOINC" => "http://loinc.org",
        "SCT" | "SNM" | "SNOMED" | "SNOMEDCT" | "SNM3" => "http://snomed.info/sct",
        "I10" | "ICD10" => "http://hl7.org/fhir/sid/icd-10",
        "I10C" | "ICD10CM" | "ICD-10-CM" => "http://hl7.org/fhir/sid/icd-10-cm",
        "I9C" | "ICD9CM" | "I9CDX" => "http://hl7.org/fhir/sid/icd-9-cm",
        "CVX" => "http://hl7.org/fhir/sid/cvx",
        "MVX" => "http://terminology.hl7.org/CodeSystem/MVX",
        "RXN" | "RXNORM" => "http://www.nlm.nih.gov/research/umls/rxnorm",
        "NDC" => "http://hl7.org/fhir/sid/ndc",
        "UCUM" => UCUM,
        upper => {
            if let Some(table) = upper.strip_prefix("HL7") {
                if table.len() == 4 && table.chars().all(|c| c.is_ascii_digit()) {
                    return format!("http://terminology.hl7.org/CodeSystem/v2-{table}");
                }
            }
            return trimmed.to_string();
        }
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tables_target_their_vocabulary() {
        for code in ["A", "IP", "SC", "CA", "DC", "RP", "CM", "ER", "HD"] {
            let target = order_status(code).unwrap();
            assert!(REQUEST_STATUS.contains(&target), "{code} -> {target}");
        }
        for code in ["C", "D", "F", "I", "N", "O", "P", "R", "S", "U", "W", "X", "A", "B"] {
            let target = observation_status(code).unwrap();
            assert!(OBSERVATION_STATUS.contains(&target), "{code} -> {target}");
        }
        for code in ["O", "I", "S", "A", "R", "P", "C", "M", "F", "X"] {
            let target = diagnostic_report_status(code).unwrap();
            assert!(DIAGNOSTIC_REPORT_STATUS.contains(&target), "{code} -> {target}");
        }
        for code in ["E", "I", "B", "O", "R", "P"] {
            assert!(ENCOUNTER_CLASS.contains(&patient_class(code).unwrap()));
        }
    }

    #[test]
    fn test_order_control_fallback_table() {
        assert_eq!(order_control_status("NW"), Some("active"));
        assert_eq!(order_control_status("OC"), Some("revoked"));
        assert_eq!(order_control_status("HD"), Some("on-hold"));
        assert_eq!(order_control_status("ZZ"), None);
    }

    #[test]
    fn test_normalize_system() {
        assert_eq!(normalize_system("LN"), "http://loinc.org");
        assert_eq!(normalize_system("sct"), "http://snomed.info/sct");
        assert_eq!(
            normalize_system("HL70085"),
            "http://terminology.hl7.org/CodeSystem/v2-0085"
        );
        assert_eq!(normalize_system("http://x.org/cs"), "http://x.org/cs");
        assert_eq!(normalize_system("LOCAL"), "LOCAL");
    }

    #[test]
    fn test_gender() {
        assert_eq!(administrative_gender("m"), "male");
        assert_eq!(administrative_gender("F"), "female");
        assert_eq!(administrative_gender(""), "unknown");
    }
}
