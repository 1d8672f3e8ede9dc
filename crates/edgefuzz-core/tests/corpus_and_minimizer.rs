//! Integration coverage for `Corpus` and `Minimizer` working together
//! without the scheduler's execution plumbing: build programs directly
//! with the IL builder, store/evict them, and shrink them under a
//! structural `keep` predicate.

use edgefuzz_core::evaluator::ProgramAspects;
use edgefuzz_core::il::{Builder, Opcode};
use edgefuzz_core::{Corpus, Minimizer};

fn program_with_loads(values: &[i64]) -> edgefuzz_core::Program {
    let mut builder = Builder::new();
    for &v in values {
        builder.emit(Opcode::LoadInteger(v), vec![]).unwrap();
    }
    builder.finalize().unwrap()
}

#[test]
fn corpus_rejects_structural_duplicates_across_many_insertions() {
    let mut corpus = Corpus::new(100, 0);
    for _ in 0..10 {
        corpus.add(program_with_loads(&[1, 2, 3]), ProgramAspects::default());
    }
    assert_eq!(corpus.size(), 1, "ten structurally identical programs collapse to one entry");
}

#[test]
fn corpus_eviction_keeps_size_bounded_once_samples_clear_their_usage_floor() {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    let mut corpus = Corpus::new(3, 2);
    for i in 0..3 {
        corpus.add(program_with_loads(&[i]), ProgramAspects::default());
    }
    assert_eq!(corpus.size(), 3);

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    // Push every entry's usage well past the floor before trying to grow further.
    for _ in 0..20 {
        corpus.random_parent(&mut rng);
    }
    for i in 10..14 {
        corpus.add(program_with_loads(&[i]), ProgramAspects::default());
    }
    assert!(corpus.size() <= 3, "eviction should keep the corpus at or below max_size once usage floors clear");
}

#[test]
fn corpus_state_round_trips_through_export_and_import() {
    let mut corpus = Corpus::new(50, 0);
    for i in 0..5 {
        corpus.add(program_with_loads(&[i, i * 2]), ProgramAspects::default());
    }
    let dump = corpus.export_state().unwrap();

    let mut restored = Corpus::new(50, 0);
    let added = restored.import_state(&dump).unwrap();
    assert_eq!(added, 5);
    assert_eq!(restored.size(), 5);
}

#[test]
fn minimizer_shrinks_toward_the_smallest_program_containing_a_target_value() {
    // Build a program with several dead loads and one instruction whose
    // output is actually used, then ask the minimizer to keep shrinking as
    // long as *some* instruction still loads the value 99.
    let mut builder = Builder::new();
    builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
    builder.emit(Opcode::LoadInteger(2), vec![]).unwrap();
    let target = builder.emit(Opcode::LoadInteger(99), vec![]).unwrap()[0];
    builder.emit(Opcode::LoadInteger(3), vec![]).unwrap();
    builder.emit(Opcode::Reassign, vec![target, target]).unwrap();
    let program = builder.finalize().unwrap();
    let original_len = program.len();

    let minimizer = Minimizer::new(0.0);
    let reduced = minimizer.minimize(&program, |candidate| {
        candidate.instructions().iter().any(|instr| matches!(&instr.opcode, Opcode::LoadInteger(99)))
    });

    assert!(reduced.len() < original_len);
    assert!(reduced.validate().is_ok());
    assert!(reduced.instructions().iter().any(|instr| matches!(&instr.opcode, Opcode::LoadInteger(99))));
}

#[test]
fn minimizer_never_shrinks_below_the_configured_floor() {
    let program = program_with_loads(&[1, 2, 3, 4, 5]);
    let floor_fraction = 0.5;
    let minimizer = Minimizer::new(floor_fraction);

    let reduced = minimizer.minimize(&program, |_| true);
    let floor = (program.len() as f64 * floor_fraction).ceil() as usize;
    assert!(reduced.len() >= floor);
}
