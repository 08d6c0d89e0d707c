//! Criterion benchmarks for the HJB solvers.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use pathwise_bench::lq_profile;
use pathwise_core::{Boundary, CancelToken, ValueArray};
use pathwise_hjb::{
    godunov_gradient, solve_stationary, LatticeMdp, MdpOptions, StationaryOptions,
};

/// Benchmark: stationary solve on a 21x21 grid.
fn bench_stationary_21(c: &mut Criterion) {
    let p = lq_profile(21).unwrap();
    let options = StationaryOptions::default();
    let cancel = CancelToken::new();

    c.bench_function("hjb_stationary_21x21", |b| {
        b.iter(|| {
            let s = solve_stationary(&p.grid, &p.dynamics, &p.cost, &options, &cancel).unwrap();
            black_box(s.residual);
        });
    });
}

/// Benchmark: lattice MDP build and solve on a 21x21 grid.
fn bench_mdp_21(c: &mut Criterion) {
    let p = lq_profile(21).unwrap();
    let options = MdpOptions::default();
    let cancel = CancelToken::new();

    c.bench_function("hjb_mdp_21x21", |b| {
        b.iter(|| {
            let mdp = LatticeMdp::new(&p.grid, &p.dynamics, &p.cost, &options).unwrap();
            black_box(mdp.solve(&options, &cancel).unwrap().iterations);
        });
    });
}

/// Benchmark: upwind gradient at every point of a 101x101 bowl.
fn bench_gradient_sweep(c: &mut Criterion) {
    let p = lq_profile(101).unwrap();
    let bowl = ValueArray::from_fn(p.grid.clone(), |_, x| x.iter().map(|v| v * v).sum());
    let boundary = Boundary::default();

    c.bench_function("godunov_gradient_101x101", |b| {
        b.iter(|| {
            for flat in 0..p.grid.len() {
                black_box(godunov_gradient(&bowl, flat, &boundary));
            }
        });
    });
}

criterion_group!(benches, bench_stationary_21, bench_mdp_21, bench_gradient_sweep);
criterion_main!(benches);
