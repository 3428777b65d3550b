use std::hint::black_box;

use capsula_core::{Callable, CaptureConfig, Capsule, register_capsule};
use criterion::{Criterion, criterion_group, criterion_main};

const SOURCE: &str = r#"
    fn scaled_sum(container, values, scale) {
        let total = 0;
        for v in values {
            total += v * scale;
        }
        total
    }
"#;

fn bench_invoke(c: &mut Criterion) {
    let values: Vec<i64> = (0..64).collect();
    let config = CaptureConfig::default().arg(values).kwarg("scale", 3_i64);
    let record = register_capsule(&Callable::script(SOURCE), &config).unwrap();
    let capsule = Capsule::build(&record, "bench.db").unwrap();

    c.bench_function("capture", |b| {
        b.iter(|| register_capsule(black_box(&Callable::script(SOURCE)), &config).unwrap())
    });
    c.bench_function("build", |b| {
        b.iter(|| Capsule::build(black_box(&record), "bench.db").unwrap())
    });
    c.bench_function("invoke_defaults", |b| b.iter(|| capsule.call().unwrap()));
    c.bench_function("invoke_override", |b| {
        b.iter(|| capsule.call_with([("scale", black_box(5_i64))]).unwrap())
    });
}

criterion_group!(benches, bench_invoke);
criterion_main!(benches);
