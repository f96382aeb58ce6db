//! Benchmarks for per-frame graph evaluation
//!
//! Measures one tick over pass-through chains of growing length, plus the
//! raw cost of integrating a spring frame.
//!
//! Run with: cargo bench --bench tick

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kinetic_core::nodes::{PassThrough, SpringSimulation, TimingRamp};
use kinetic_core::{Binding, Graph, ManualClock, SpringConfig};

const FRAME_NS: i64 = 16_000_000;

/// Ramp feeding `len` pass-throughs. The ramp outlasts any benchmark run.
fn chain(graph: &Graph, len: usize) -> Binding {
    let mut binding = graph.binding();
    let mut previous = graph.add_node(TimingRamp::new(Duration::from_secs(24 * 3600)));
    for _ in 0..len {
        let next = graph.add_node(PassThrough::new());
        binding.add_edge(previous, next).unwrap();
        previous = next;
    }
    binding.activate().unwrap();
    binding
}

/// Benchmark a full tick over chains of increasing length
fn bench_tick_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_chain");

    for len in [10, 100, 1000] {
        let graph = Graph::new(ManualClock::new());
        let _binding = chain(&graph, len);
        let mut frame_time = 0;

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                frame_time += FRAME_NS;
                graph.tick(black_box(frame_time)).unwrap();
            })
        });
    }

    group.finish();
}

/// Benchmark integrating one 16 ms frame of spring motion
fn bench_spring_frame(c: &mut Criterion) {
    let mut simulation = SpringSimulation::new(SpringConfig::default());

    c.bench_function("spring_frame", |b| {
        b.iter(|| {
            simulation.reset(0.0, 100.0);
            black_box(simulation.advance(black_box(0.016)))
        })
    });
}

criterion_group!(benches, bench_tick_chain, bench_spring_frame);
criterion_main!(benches);
