use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octofhir_hl7v2::*;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

const MSH: &str = "MSH|^~\\&|LAB|HOSP|||20240101120000||ORM^O01|MSG1|P|2.5";
const PID: &str = "PID|1||123^^^HOSP^MR||Doe^John||19800101|M";
const PV1: &str = "PV1|1|O|||||||||||||||||V100";

/// An order message with `orders` lab groups of three observations each.
fn order_message(orders: usize) -> String {
    let mut lines = vec![MSH.to_string(), PID.to_string(), PV1.to_string()];
    for n in 0..orders {
        lines.push(format!("ORC|NW|ORD{n}|||SC"));
        lines.push(format!("OBR|1|ORD{n}||CBC^Complete blood count^LN"));
        lines.push("DG1|1||R50.9^Fever^I10|||W".to_string());
        for set_id in 1..=3 {
            lines.push(format!(
                "OBX|{set_id}|NM|WBC^White cells^LN||7.{set_id}|10*9/L|4.0-11.0|N|||F"
            ));
        }
    }
    lines.join("\r")
}

fn converter(max_concurrent_groups: usize) -> Hl7v2Converter {
    Hl7v2Converter::new(
        ConverterConfig::default().with_max_concurrent_groups(max_concurrent_groups),
        Arc::new(InMemoryConceptMapSource::new()),
    )
}

fn bench_decode(c: &mut Criterion) {
    let text = order_message(20);
    c.bench_function("decode_20_orders", |b| {
        b.iter(|| black_box(Message::parse(black_box(&text))).unwrap())
    });
}

fn bench_convert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("convert_order_message");

    for orders in [1usize, 10, 50] {
        let message = Message::parse(&order_message(orders)).unwrap();
        group.throughput(Throughput::Elements(orders as u64));
        for limit in [1usize, 8] {
            let converter = converter(limit);
            group.bench_with_input(
                BenchmarkId::new(format!("concurrency_{limit}"), orders),
                &message,
                |b, message| b.iter(|| rt.block_on(converter.convert(black_box(message)))),
            );
        }
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let message = Message::parse(&order_message(10)).unwrap();
    let result = rt.block_on(converter(4).convert(&message));

    c.bench_function("serialize_result_10_orders", |b| {
        b.iter(|| black_box(serde_json::to_string(&result)).unwrap())
    });
}

criterion_group!(benches, bench_decode, bench_convert, bench_serialize);
criterion_main!(benches);
