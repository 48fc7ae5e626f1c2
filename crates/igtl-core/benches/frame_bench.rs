//! Criterion benchmarks for the frame envelope.
//!
//! Run with:
//! ```bash
//! cargo bench --package igtl-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use igtl_core::{decode_frame, encode_frame, DataObject, DeviceName, Transform};

fn fixtures() -> Vec<(&'static str, DataObject)> {
    vec![
        (
            "transform",
            DataObject::Transform(Transform::from_translation(12.5, -3.0, 88.25)),
        ),
        (
            "status",
            DataObject::Status {
                code: 1,
                message: "tracking".to_string(),
            },
        ),
        ("text", DataObject::Text("x".repeat(256))),
        (
            "raw_64k",
            DataObject::Raw {
                type_name: "IMAGE".to_string(),
                bytes: vec![0x5A; 64 * 1024],
            },
        ),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let name = DeviceName::new("Probe").expect("valid name");
    let mut group = c.benchmark_group("encode_frame");
    for (label, obj) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(label), &obj, |b, obj| {
            b.iter(|| encode_frame(black_box(obj), &name, 42, 1_000).expect("encode"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let name = DeviceName::new("Probe").expect("valid name");
    let mut group = c.benchmark_group("decode_frame");
    for (label, obj) in fixtures() {
        let bytes = encode_frame(&obj, &name, 42, 1_000).expect("encode");
        group.bench_with_input(BenchmarkId::from_parameter(label), &bytes, |b, bytes| {
            b.iter(|| decode_frame(black_box(bytes)).expect("decode"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
