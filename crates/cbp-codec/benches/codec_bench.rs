//! Encode/decode throughput: one group per pipeline shape, no test
//! harness.

use cbp_codec::{Decoder, EncodeOptions, Encoder, StructuredMessage, Value};
use cbp_registry::SemanticRegistry;
use cbp_schema::AgentId;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn small_message() -> StructuredMessage {
    StructuredMessage::request(
        AgentId::ORCHESTRATOR,
        AgentId::CODER,
        Value::Map(vec![(Value::from("task"), Value::from("analyze"))]),
    )
}

fn large_message() -> StructuredMessage {
    let entries = (0..64)
        .map(|i| (Value::from(format!("field_{i}")), Value::from("x".repeat(32))))
        .collect();
    StructuredMessage::request(AgentId::ORCHESTRATOR, AgentId::CODER, Value::Map(entries))
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let registry = Arc::new(SemanticRegistry::new(1024));
    let plain = Encoder::new(Arc::clone(&registry), EncodeOptions {
        use_dedup: false,
        use_compression: false,
        ..EncodeOptions::default()
    });
    let msg = small_message();
    group.bench_function("small_no_transforms", |b| {
        b.iter(|| plain.encode(black_box(&msg), None).unwrap());
    });

    let compressing = Encoder::new(registry, EncodeOptions::default());
    let big = large_message();
    group.bench_function("large_with_compression", |b| {
        b.iter(|| compressing.encode(black_box(&big), None).unwrap());
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let registry = Arc::new(SemanticRegistry::new(1024));
    let encoder = Encoder::new(Arc::clone(&registry), EncodeOptions {
        use_dedup: false,
        use_compression: false,
        ..EncodeOptions::default()
    });
    let decoder = Decoder::new(registry);
    let bytes = encoder.encode(&small_message(), None).unwrap();

    group.bench_function("small_no_transforms", |b| {
        b.iter(|| decoder.decode(black_box(&bytes)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
