//! The coverage evaluator: shared-memory edge bitmap, new-edge detection,
//! and crash deduplication.
//!
//! Grounded on `ouros::tracer::CoverageTracer` (instruction-pointer
//! coverage inside one VM) generalized to cross-process coverage read from
//! a byte-per-edge shared-memory region, and on `ouros::resource` for the
//! manual error-enum style used by [`crate::error::EvaluatorError`].

use std::collections::BTreeSet;

use crate::error::EvaluatorError;
use crate::il::Program;
use crate::runner::execution::{Execution, Outcome};

/// An opaque fingerprint of *why* a program is interesting.
///
/// For the coverage evaluator this is the set of newly covered edge
/// indices. Supports the operations named in the data model: `intersect`,
/// `count`, equality, and serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProgramAspects {
    edges: BTreeSet<u32>,
}

impl ProgramAspects {
    pub fn from_edges(edges: impl IntoIterator<Item = u32>) -> Self {
        Self { edges: edges.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = u32> + '_ {
        self.edges.iter().copied()
    }

    /// Set intersection. `intersect(a, a) == a` and intersection is
    /// associative, as required by §8's round-trip properties.
    pub fn intersect(&self, other: &ProgramAspects) -> ProgramAspects {
        ProgramAspects { edges: self.edges.intersection(&other.edges).copied().collect() }
    }
}

/// Shared-memory edge bitmap plus the virgin/crash bookkeeping bitmaps
/// that mirror it, exactly as specified in §4.4.
pub struct CoverageEvaluator {
    /// Region the child process writes 8-bit edge-hit counters into. In
    /// this core crate it is a plain owned buffer; `edgefuzz-cli` maps it
    /// onto the POSIX shm region named by `SHM_ID` (§6.7) before handing
    /// the child its environment.
    shared_region: Vec<u8>,
    /// Edges never seen in a successful execution.
    virgin_bits: Vec<bool>,
    /// Edges never seen in a crashing execution.
    crash_bits: Vec<bool>,
    found_edges: usize,
}

impl CoverageEvaluator {
    /// Allocates a bitmap sized exactly to `edge_count` edges. Allocation
    /// failure here is fatal at initialization per §4.4/§7; in Rust that
    /// surfaces as the ordinary allocator abort, so this constructor can't
    /// fail for any `edge_count` that actually fits in memory - callers
    /// that need a recoverable failure path (e.g. a configured maximum)
    /// should validate `edge_count` before calling.
    pub fn new(edge_count: usize) -> Self {
        Self {
            shared_region: vec![0u8; edge_count],
            virgin_bits: vec![true; edge_count],
            crash_bits: vec![true; edge_count],
            found_edges: 0,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.shared_region.len()
    }

    /// Direct access to the shared region, for a `Runner` implementation to
    /// hand its raw pointer/fd to the child process.
    pub fn shared_region_mut(&mut self) -> &mut [u8] {
        &mut self.shared_region
    }

    /// `PreExecute` hook: zeroes the shared region before the next script
    /// runs, so this execution's hits aren't confused with a previous run's.
    pub fn clear_bitmap(&mut self) {
        self.shared_region.iter_mut().for_each(|b| *b = 0);
    }

    /// Edges newly covered by a succeeded execution, or `None` if nothing
    /// new was covered.
    pub fn evaluate(&mut self, execution: &Execution) -> Option<ProgramAspects> {
        if execution.outcome != Outcome::Succeeded {
            return None;
        }
        let mut new_edges = Vec::new();
        for (i, &hit) in self.shared_region.iter().enumerate() {
            if hit != 0 && self.virgin_bits[i] {
                self.virgin_bits[i] = false;
                new_edges.push(i as u32);
                self.found_edges += 1;
            }
        }
        if new_edges.is_empty() {
            None
        } else {
            Some(ProgramAspects::from_edges(new_edges))
        }
    }

    /// Edges newly covered by a crashing execution, i.e. a new crash
    /// signature. `None` means this crash's coverage has been seen before.
    pub fn evaluate_crash(&mut self, execution: &Execution) -> Option<ProgramAspects> {
        if !matches!(execution.outcome, Outcome::Crashed { .. }) {
            return None;
        }
        let mut new_edges = Vec::new();
        for (i, &hit) in self.shared_region.iter().enumerate() {
            if hit != 0 && self.crash_bits[i] {
                self.crash_bits[i] = false;
                new_edges.push(i as u32);
            }
        }
        if new_edges.is_empty() {
            None
        } else {
            Some(ProgramAspects::from_edges(new_edges))
        }
    }

    /// `true` if `aspects` is still (a subset of) what the current bitmap
    /// state would report for `execution` — used by the minimizer to check
    /// whether a reduced candidate preserves the aspects being minimized
    /// for.
    pub fn has_aspects(&self, execution: &Execution, aspects: &ProgramAspects) -> bool {
        match execution.outcome {
            Outcome::Succeeded => aspects.edges().all(|e| self.shared_region.get(e as usize).copied().unwrap_or(0) != 0),
            Outcome::Crashed { .. } => {
                aspects.edges().all(|e| self.shared_region.get(e as usize).copied().unwrap_or(0) != 0)
            }
            _ => aspects.is_empty(),
        }
    }

    /// Intersects `aspects` against what this program's latest execution
    /// actually produced; used by the scheduler's determinism check (§4.7)
    /// to narrow down to the subset stable across replays. `program` is
    /// unused by this evaluator (the coverage bitmap alone determines
    /// aspects) but is part of the interface (§6.5) because other
    /// evaluators might need it (e.g. a static-analysis evaluator keyed on
    /// program shape).
    pub fn compute_aspect_intersection(&self, _program: &Program, aspects: &ProgramAspects) -> Option<ProgramAspects> {
        let observed: BTreeSet<u32> =
            self.shared_region.iter().enumerate().filter(|(_, &hit)| hit != 0).map(|(i, _)| i as u32).collect();
        let narrowed = ProgramAspects { edges: aspects.edges.intersection(&observed).copied().collect() };
        if narrowed.is_empty() {
            None
        } else {
            Some(narrowed)
        }
    }

    /// Fraction of all edges ever covered, in `[0, 1]`.
    pub fn current_score(&self) -> f64 {
        if self.shared_region.is_empty() {
            return 0.0;
        }
        (self.found_edges as f64 / self.shared_region.len() as f64).clamp(0.0, 1.0)
    }

    pub fn found_edges(&self) -> usize {
        self.found_edges
    }

    /// Serializes `found_edges` and both bitmaps for cross-instance sync.
    pub fn export_state(&self) -> Vec<u8> {
        let snapshot = EvaluatorSnapshot {
            found_edges: self.found_edges,
            virgin_bits: self.virgin_bits.clone(),
            crash_bits: self.crash_bits.clone(),
        };
        postcard::to_allocvec(&snapshot).expect("evaluator snapshot serialization cannot fail")
    }

    /// Restores state from [`CoverageEvaluator::export_state`] bytes,
    /// rejecting imports whose bitmap size doesn't match this instance's.
    pub fn import_state(&mut self, bytes: &[u8]) -> Result<(), EvaluatorError> {
        let snapshot: EvaluatorSnapshot =
            postcard::from_bytes(bytes).map_err(|_| EvaluatorError::StateSizeMismatch { local: self.edge_count(), imported: 0 })?;
        if snapshot.virgin_bits.len() != self.virgin_bits.len() || snapshot.crash_bits.len() != self.crash_bits.len() {
            return Err(EvaluatorError::StateSizeMismatch {
                local: self.edge_count(),
                imported: snapshot.virgin_bits.len(),
            });
        }
        self.found_edges = snapshot.found_edges;
        self.virgin_bits = snapshot.virgin_bits;
        self.crash_bits = snapshot.crash_bits;
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct EvaluatorSnapshot {
    found_edges: usize,
    virgin_bits: Vec<bool>,
    crash_bits: Vec<bool>,
}
