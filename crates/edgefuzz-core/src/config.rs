//! Fuzzer-wide configuration, threaded through every component at
//! construction time the way `ouros::resource::ResourceLimits` is threaded
//! through `ReplSession::new`.

use std::time::Duration;

/// Tunables for a single fuzzer instance. All fields have defaults matching
/// the values named in spec.md; construct with `FuzzerConfig::default()`
/// and override only what you need.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzerConfig {
    /// Corpus eviction threshold (§4.3).
    pub max_corpus_size: usize,
    /// Minimum number of times a sample must be used as a mutation parent
    /// before it becomes eligible for eviction (§4.3).
    pub min_mutations_per_sample: u32,
    /// Determinism-check lower bound: keep replaying until at least this
    /// many runs have converged on a stable aspect subset (§4.7).
    pub min_determinism_attempts: u32,
    /// Determinism-check upper bound: give up and discard if convergence
    /// hasn't happened by this attempt (§4.7).
    pub max_determinism_attempts: u32,
    /// Respawn the REPRL child after this many executions (§4.5).
    pub max_execs_before_respawn: u32,
    /// Per-script execution timeout (§4.5).
    pub execution_timeout: Duration,
    /// Consecutive execution failures before the fuzzer aborts (§4.5, §7).
    pub max_consecutive_failures: u32,
    /// Largest script, in bytes, the REPRL data channel will accept;
    /// larger scripts are rejected with `timedOut` (§4.5, §8).
    pub max_script_size: usize,
    /// Minimum fraction of the original program length the minimizer must
    /// retain (§4.6).
    pub minimization_limit: f64,
    /// Consecutive empty-result iterations before initial corpus
    /// generation hands control back to the configured engine (§4.7).
    pub initial_generation_patience: u32,
    /// Instruction budget for a freshly generated program (§4.2).
    pub generation_instruction_budget: u32,
    /// Inclusive range of consecutive mutations applied per iteration
    /// (§4.2: "2-5").
    pub consecutive_mutations: (u32, u32),
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            max_corpus_size: 10_000,
            min_mutations_per_sample: 10,
            min_determinism_attempts: 5,
            max_determinism_attempts: 50,
            max_execs_before_respawn: 1_000,
            execution_timeout: Duration::from_millis(250),
            max_consecutive_failures: 10,
            max_script_size: 1 << 20,
            minimization_limit: 0.0,
            initial_generation_patience: 100,
            generation_instruction_budget: 25,
            consecutive_mutations: (2, 5),
        }
    }
}
