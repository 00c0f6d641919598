//! Benchmarks for config composition.
//!
//! Composition runs once per training launch; these keep an eye on the
//! override fixed point and interpolation as the tree grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use soundlm::config::{compose_config, missing_keys, parse_overrides, LoadRequest};
use soundlm::optim::build_scheduler;

/// Benchmark composing the shipped AudioGen solver
fn bench_compose_shipped(c: &mut Criterion) {
    let request = LoadRequest::default();
    c.bench_function("compose/audiogen_base_16khz", |b| {
        b.iter(|| black_box(compose_config(black_box(&request)).unwrap()))
    });
}

/// Benchmark composition with a growing number of value overrides
fn bench_compose_with_overrides(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_overrides");

    for count in [1usize, 10, 50].iter() {
        let overrides: Vec<String> = (0..*count)
            .map(|i| format!("+extra.key_{i}=${{sample_rate}}"))
            .collect();
        let request = LoadRequest::audiogen(overrides);
        group.bench_with_input(BenchmarkId::new("added_keys", count), &request, |b, request| {
            b.iter(|| black_box(compose_config(request).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark the typed view and the scheduler built from it
fn bench_typed_view(c: &mut Criterion) {
    let composed = compose_config(&LoadRequest::default()).unwrap();
    c.bench_function("typed_view", |b| {
        b.iter(|| black_box(composed.typed().unwrap()))
    });

    let config = composed.typed().unwrap();
    c.bench_function("scheduler_preview", |b| {
        b.iter(|| {
            let scheduler = build_scheduler(&config).unwrap();
            black_box((0..10_000).step_by(100).map(|s| scheduler.lr_at(s)).sum::<f64>())
        })
    });
}

/// Benchmark override parsing and missing-key scans
fn bench_override_parsing(c: &mut Criterion) {
    let texts = [
        "compression_model_checkpoint=//pretrained/audiogen_encodec_16khz",
        "dataset.train.mix_p=0.25",
        "+dataset.train.extra=[1, 2, 3]",
        "~generate.lm.prompt_duration",
        "optim.lr=0.0003",
    ];
    c.bench_function("parse_overrides", |b| {
        b.iter(|| black_box(parse_overrides(black_box(texts)).unwrap()))
    });

    let composed = compose_config(&LoadRequest::default()).unwrap();
    c.bench_function("missing_keys", |b| {
        b.iter(|| black_box(missing_keys(composed.tree())))
    });
}

criterion_group!(
    benches,
    bench_compose_shipped,
    bench_compose_with_overrides,
    bench_typed_view,
    bench_override_parsing,
);
criterion_main!(benches);
