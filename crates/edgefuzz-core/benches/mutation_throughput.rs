//! Throughput of the two hot paths the scheduler calls every iteration:
//! generating a fresh program from scratch, and mutating an existing one.
//! Modeled on `ouros`'s `arithmetic_non_foldable` bench shape (build once,
//! time a tight `bench.iter` loop over the operation under test).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use edgefuzz_core::config::FuzzerConfig;
use edgefuzz_core::engine::{FuzzEngine, NoopTracer};

fn bench_generate(c: &mut Criterion) {
    let engine = FuzzEngine::new(FuzzerConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut tracer = NoopTracer;

    c.bench_function("generate_program", |b| {
        b.iter(|| {
            let program = engine.generate(&mut rng, &mut tracer).expect("generation should not fail");
            black_box(program);
        });
    });
}

fn bench_mutate(c: &mut Criterion) {
    let engine = FuzzEngine::new(FuzzerConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let mut tracer = NoopTracer;
    let seed_program = engine.generate(&mut rng, &mut tracer).expect("seed generation should not fail");

    let mut engine = engine;
    c.bench_function("mutate_program", |b| {
        b.iter(|| {
            let mutated = engine.mutate(&seed_program, None, &mut rng, &mut tracer).expect("mutation should not fail");
            black_box(mutated);
        });
    });
}

criterion_group!(benches, bench_generate, bench_mutate);
criterion_main!(benches);
