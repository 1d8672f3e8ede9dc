//! The sample store and parent scheduler (§4.3).
//!
//! Grounded on `ouros::session::SessionPool`'s recency-weighted eviction
//! policy, generalized from "evict the session least recently touched" to
//! "evict the lowest-usage entry, but never one still under its minimum
//! mutation budget".

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::CorpusError;
use crate::evaluator::ProgramAspects;
use crate::il::Program;
use crate::serialization::{deserialize_programs, serialize_programs};

/// One stored sample plus the bookkeeping the scheduler needs to pick
/// parents and decide eviction eligibility.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub program: Program,
    pub aspects: ProgramAspects,
    /// Insertion order; the oldest entry has the smallest `age`.
    pub age: u64,
    /// Times this entry has been handed out by `random_parent`.
    pub usage_count: u32,
}

/// Stores interesting programs and schedules parents for mutation, per the
/// basic variant in §4.3 — more sophisticated corpora are pluggable behind
/// the same four operations the scheduler actually calls.
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    structural_hashes: std::collections::HashSet<u64>,
    max_size: usize,
    min_mutations_per_sample: u32,
    next_age: u64,
}

impl Corpus {
    pub fn new(max_size: usize, min_mutations_per_sample: u32) -> Self {
        Self { entries: Vec::new(), structural_hashes: std::collections::HashSet::new(), max_size, min_mutations_per_sample, next_age: 0 }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_programs(&self) -> impl Iterator<Item = &Program> {
        self.entries.iter().map(|e| &e.program)
    }

    /// Appends `program` unless a structurally identical one is already
    /// stored (§3's corpus-entry "no duplicates" invariant). Evicts the
    /// lowest-usage eligible entry first if this insertion would exceed
    /// `max_size`. Returns `true` if the program was actually added.
    pub fn add(&mut self, program: Program, aspects: ProgramAspects) -> bool {
        let hash = program.structural_hash();
        if self.structural_hashes.contains(&hash) {
            return false;
        }
        if self.entries.len() >= self.max_size {
            self.evict_one();
        }
        self.structural_hashes.insert(hash);
        self.entries.push(CorpusEntry { program, aspects, age: self.next_age, usage_count: 0 });
        self.next_age += 1;
        true
    }

    /// Evicts the oldest entry among those that have already been used at
    /// least `min_mutations_per_sample` times. If every entry is still
    /// under budget, evicts nothing (the corpus is briefly allowed to grow
    /// past `max_size` rather than discard an under-used sample).
    fn evict_one(&mut self) {
        let candidate = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.usage_count >= self.min_mutations_per_sample)
            .min_by_key(|(_, e)| e.age)
            .map(|(i, _)| i);
        if let Some(i) = candidate {
            let removed = self.entries.remove(i);
            self.structural_hashes.remove(&removed.program.structural_hash());
        }
    }

    /// Picks a parent weighted by recency and edge count: newer entries and
    /// entries covering more edges are proportionally more likely, but
    /// every entry retains nonzero weight so nothing starves entirely.
    pub fn random_parent(&mut self, rng: &mut ChaCha8Rng) -> Option<&Program> {
        if self.entries.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self
            .entries
            .iter()
            .map(|e| {
                let recency = (e.age + 1) as f64;
                let coverage = (e.aspects.count() + 1) as f64;
                recency * coverage
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let mut pick = rng.gen_range(0.0..total);
        let mut chosen = self.entries.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if pick < *w {
                chosen = i;
                break;
            }
            pick -= w;
        }
        self.entries[chosen].usage_count += 1;
        Some(&self.entries[chosen].program)
    }

    /// Flat, length-prefixed concatenation of every stored program (§6.1);
    /// aspects and age/usage bookkeeping are not persisted, since they are
    /// cheaply recomputed by re-running the corpus through the evaluator on
    /// import.
    pub fn export_state(&self) -> Result<Vec<u8>, CorpusError> {
        Ok(serialize_programs(self.all_programs())?)
    }

    /// Restores programs from a previous `export_state` dump, each
    /// re-entered through `add` so structural deduplication still applies.
    pub fn import_state(&mut self, bytes: &[u8]) -> Result<usize, CorpusError> {
        let programs = deserialize_programs(bytes)?;
        let mut added = 0;
        for program in programs {
            if self.add(program, ProgramAspects::default()) {
                added += 1;
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Builder, Opcode};
    use rand::SeedableRng;

    fn program_with(value: i64) -> Program {
        let mut builder = Builder::new();
        builder.emit(Opcode::LoadInteger(value), vec![]).unwrap();
        builder.finalize().unwrap()
    }

    #[test]
    fn duplicate_programs_are_rejected() {
        let mut corpus = Corpus::new(10, 0);
        assert!(corpus.add(program_with(1), ProgramAspects::default()));
        assert!(!corpus.add(program_with(1), ProgramAspects::default()));
        assert_eq!(corpus.size(), 1);
    }

    #[test]
    fn eviction_only_touches_entries_past_their_usage_floor() {
        let mut corpus = Corpus::new(2, 1);
        corpus.add(program_with(1), ProgramAspects::default());
        corpus.add(program_with(2), ProgramAspects::default());
        // Neither entry has been used yet, so a third insertion can't evict anything.
        corpus.add(program_with(3), ProgramAspects::default());
        assert_eq!(corpus.size(), 3);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        corpus.random_parent(&mut rng); // bump some entry's usage_count to 1
        corpus.random_parent(&mut rng);
        corpus.add(program_with(4), ProgramAspects::default());
        assert!(corpus.size() <= 3);
    }

    #[test]
    fn export_then_import_round_trips_all_programs() {
        let mut corpus = Corpus::new(10, 0);
        corpus.add(program_with(1), ProgramAspects::default());
        corpus.add(program_with(2), ProgramAspects::default());
        let bytes = corpus.export_state().unwrap();

        let mut restored = Corpus::new(10, 0);
        let added = restored.import_state(&bytes).unwrap();
        assert_eq!(added, 2);
        assert_eq!(restored.size(), 2);
    }

    #[test]
    fn random_parent_returns_none_when_empty() {
        let mut corpus = Corpus::new(10, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(corpus.random_parent(&mut rng).is_none());
    }
}
