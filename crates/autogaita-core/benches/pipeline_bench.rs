//! Benchmarks for the step-cycle engine's hot paths.
//!
//! Inputs are deterministic closed-form trajectories. Run with:
//!
//! ```bash
//! cargo bench -p autogaita-core
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use autogaita_core::aggregate::{summarise, Cycle, StepTable};
use autogaita_core::features::gradient;
use autogaita_core::normalize::normalise_cycle;
use autogaita_core::Table;

/// A cycle of `len` samples with `joints` x/y pairs plus an angle column.
fn cycle(len: usize, joints: usize) -> Table {
    let mut columns: Vec<(String, Vec<f64>)> = Vec::with_capacity(joints * 2 + 1);
    for j in 0..joints {
        let phase = j as f64 * 0.4;
        columns.push((format!("J{j} x"), (0..len).map(|i| i as f64 * 1.5 + phase).collect()));
        columns.push((format!("J{j} y"), (0..len).map(|i| (i as f64 * 0.2 + phase).sin()).collect()));
    }
    columns.push(("J1 Angle".to_string(), (0..len).map(|i| 90.0 + (i as f64 * 0.1).cos()).collect()));
    Table::from_columns(columns).unwrap()
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

fn bench_normalise(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalise_cycle");
    for len in [12_usize, 60, 240] {
        let t = cycle(len, 8);
        group.bench_with_input(BenchmarkId::from_parameter(len), &t, |b, t| {
            b.iter(|| normalise_cycle(black_box(t), 25).unwrap());
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn bench_summarise(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarise");
    for n_cycles in [4_usize, 32] {
        let step = StepTable::new(
            (0..n_cycles)
                .map(|k| Cycle::new(normalise_cycle(&cycle(40 + k, 8), 25).unwrap()))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n_cycles), &step, |b, step| {
            b.iter(|| summarise(black_box(step), 25, |_| true).unwrap());
        });
    }
    group.finish();
}

fn bench_gradient(c: &mut Criterion) {
    let t = cycle(1000, 1);
    let x = t.column("J0 x").unwrap().to_owned();
    c.bench_function("gradient_1000", |b| {
        b.iter(|| gradient(black_box(x.view())));
    });
}

criterion_group!(benches, bench_normalise, bench_summarise, bench_gradient);
criterion_main!(benches);
