use std::hint::black_box;

use capsula_core::{Callable, CaptureConfig, DEFAULT_GROUP, register_capsule};
use capsula_store::Container;
use criterion::{Criterion, criterion_group, criterion_main};

const SOURCE: &str = r#"
    /// Scales a series.
    fn scale(container, values, factor) {
        values.map(|v| v * factor)
    }
"#;

fn bench_save_load(c: &mut Criterion) {
    let values: Vec<f64> = (0..256).map(|i| i as f64 * 0.5).collect();
    let config = CaptureConfig::default().arg(values).kwarg("factor", 2.0_f64);
    let record = register_capsule(&Callable::script(SOURCE), &config).unwrap();

    let container = Container::open_in_memory().unwrap();
    c.bench_function("save_capsule", |b| {
        b.iter(|| {
            container
                .save_capsule(DEFAULT_GROUP, "scale", black_box(&record))
                .unwrap()
        })
    });
    c.bench_function("load_capsule", |b| {
        b.iter(|| container.load_capsule(DEFAULT_GROUP, black_box("scale")).unwrap())
    });
}

criterion_group!(benches, bench_save_load);
criterion_main!(benches);
