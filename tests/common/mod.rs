use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use octofhir_hl7v2::*;

pub const MSH_ORM: &str = "MSH|^~\\&|LAB|HOSP|||20240101120000||ORM^O01|MSG1|P|2.5";
pub const MSH_ORU: &str = "MSH|^~\\&|LAB|HOSP|||20240101120000||ORU^R01|MSG2|P|2.5";
pub const MSH_VXU: &str = "MSH|^~\\&|IIS|CLINIC|||20240101120000||VXU^V04|MSG3|P|2.5.1";
pub const MSH_ADT: &str = "MSH|^~\\&|ADT|HOSP|||20240101120000||ADT^A01|MSG4|P|2.5";

pub const PID: &str = "PID|1||123^^^HOSP^MR||Doe^John||19800101|M";
pub const PV1_VISIT: &str =
    "PV1|1|O|||||||||||||||||V100|||||||||||||||||||||||||20240101080000";

/// Join segment lines the way they travel on the wire.
pub fn hl7(lines: &[&str]) -> String {
    lines.join("\r")
}

#[allow(dead_code)]
pub fn parse(lines: &[&str]) -> Message {
    Message::parse(&hl7(lines)).unwrap()
}

#[allow(dead_code)]
pub fn converter() -> Hl7v2Converter {
    Hl7v2Converter::new(
        ConverterConfig::default(),
        Arc::new(InMemoryConceptMapSource::new()),
    )
}

#[allow(dead_code)]
pub fn lab_order(order: &str, order_status: &str, observation_status: &str) -> Vec<String> {
    vec![
        format!("ORC|NW|{order}|||{order_status}"),
        format!("OBR|1|{order}||CBC^Complete blood count^LN"),
        format!("OBX|1|NM|WBC^White cells^LN||7.2|10*9/L|4.0-11.0|N|||{observation_status}"),
    ]
}

/// Sample ORM with a single lab order whose codes are all in the static tables.
#[allow(dead_code)]
pub fn orm_lab() -> String {
    hl7(&[
        MSH_ORM,
        PID,
        PV1_VISIT,
        "ORC|NW|ORD1|FIL1||SC",
        "OBR|1|ORD1|FIL1|CBC^Complete blood count^LN|||20240101120000",
        "NTE|1||Fasting sample",
        "DG1|1||R50.9^Fever^I10||20240101|W",
        "OBX|1|NM|WBC^White cells^LN||7.2|10*9/L|4.0-11.0|N|||F",
        "NTE|1||Repeat if above range",
    ])
}

/// Sample ORU with one report, an order-level note and two results.
#[allow(dead_code)]
pub fn oru() -> String {
    hl7(&[
        MSH_ORU,
        PID,
        PV1_VISIT,
        "ORC|RE|ORD1|FIL1",
        "OBR|1|ORD1|FIL1|CBC^Complete blood count^LN|||20240101120000||||||||||||||||||F",
        "NTE|1||Specimen slightly hemolyzed",
        "OBX|1|NM|WBC^White cells^LN||7.2|10*9/L|4.0-11.0|N|||F",
        "OBX|2|SN|PLT^Platelets^LN||<^10|10*9/L||L|||F",
    ])
}

#[allow(dead_code)]
pub fn vxu() -> String {
    hl7(&[
        MSH_VXU,
        PID,
        "ORC|RE||IMM1",
        "RXA|0|1|20240101||08^HepB^CVX|0.5|mL^milliliter^UCUM||||||||LOT1||MSD^Merck^MVX|||CP",
    ])
}

#[allow(dead_code)]
pub fn adt() -> String {
    hl7(&[
        MSH_ADT,
        PID,
        PV1_VISIT,
        "IN1|1|PLAN1|PAYER1|Acme Insurance||||||||||||||||||||||||||||||||SUB123",
        "DG1|1||I10^Hypertension^I10|||F",
    ])
}

/// ConceptMap source that counts lookups.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingSource {
    pub inner: InMemoryConceptMapSource,
    pub fetches: AtomicUsize,
}

#[allow(dead_code)]
impl CountingSource {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConceptMapSource for CountingSource {
    async fn fetch(&self, id: &str) -> Option<ConceptMap> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(id).await
    }
}

#[allow(dead_code)]
pub fn resource_ids(result: &ConversionResult) -> Vec<(String, String)> {
    result
        .bundle()
        .map(|bundle| {
            bundle
                .resources()
                .map(|r| (r.resource_type().to_string(), r.id().to_string()))
                .collect()
        })
        .unwrap_or_default()
}
