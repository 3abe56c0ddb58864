//! Benchmarks for dataset assembly and shuffled export

#![allow(clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stimulus_dataset::{
    DatasetAssembler, Example, GeneratedExamples, NormalizedRecord, ShuffledExport,
};

fn create_examples(n: usize) -> GeneratedExamples {
    let mut data = GeneratedExamples::default();
    for i in 0..n {
        let tones = i % 4 + 1;
        let frequencies = (0..tones)
            .map(|t| ((i * 37 + t * 211) % 15_000) as f64 + 100.0)
            .collect();
        let levels = (0..tones).map(|t| 30 + ((i + t) % 50) as i32).collect();
        let phons = (0..tones).map(|t| 20 + ((i * 3 + t) % 60) as i32).collect();
        if let Ok(example) = Example::new(frequencies, levels, phons) {
            data.push(example);
        }
    }
    data
}

fn create_records(n: usize) -> Vec<NormalizedRecord> {
    (0..n)
        .map(|i| NormalizedRecord::new(format!("[{i},50]"), format!("[[{i},50],[1000,60]]")))
        .collect()
}

fn benchmark_shuffled_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffled_export");

    for size in &[100, 1_000, 10_000] {
        let records = create_records(*size);

        group.bench_function(format!("shuffle_{size}_records"), |b| {
            b.iter(|| ShuffledExport::new(black_box(&records), 1));
        });

        let export = ShuffledExport::new(&records, 1);
        group.bench_function(format!("render_{size}_records"), |b| {
            b.iter(|| black_box(&export).records_csv());
        });
    }

    group.finish();
}

fn benchmark_multi_tone_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_tone_assembly");
    let assembler = DatasetAssembler::default();

    for size in &[100, 1_000, 5_000] {
        let data = create_examples(*size);

        group.bench_function(format!("build_{size}_examples"), |b| {
            b.iter(|| assembler.build_multi_tone(black_box(&data)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_shuffled_export, benchmark_multi_tone_assembly);
criterion_main!(benches);
