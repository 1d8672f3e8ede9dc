//! Per-mutator/generator success bookkeeping, consulted by the weighted
//! chooser (§4.2: "weighted by per-mutator success statistics and a
//! configured prior").

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct MutatorStats {
    pub attempts: u64,
    pub successes: u64,
}

impl MutatorStats {
    /// Weight folding this mutator's observed success rate against a
    /// configured `prior` (itself a weight, not a probability), so a
    /// mutator with few or no attempts still gets picked occasionally.
    pub fn weight(&self, prior: f64) -> f64 {
        let observed = self.successes.max(1) as f64 / self.attempts.max(1) as f64;
        (observed + prior).max(f64::MIN_POSITIVE)
    }

    pub fn record(&mut self, succeeded: bool) {
        self.attempts += 1;
        if succeeded {
            self.successes += 1;
        }
    }
}

/// Tracks [`MutatorStats`] per named mutator or generator.
#[derive(Debug, Default)]
pub struct StatsTable {
    by_name: HashMap<&'static str, MutatorStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &'static str, succeeded: bool) {
        self.by_name.entry(name).or_default().record(succeeded);
    }

    pub fn get(&self, name: &'static str) -> MutatorStats {
        self.by_name.get(name).copied().unwrap_or_default()
    }

    /// Chooses one name from `candidates` weighted by each name's current
    /// stats folded against `prior`, using `rng` for the draw.
    pub fn weighted_choice<'a>(
        &self,
        candidates: &[&'a str],
        prior: f64,
        rng: &mut rand_chacha::ChaCha8Rng,
    ) -> Option<&'a str> {
        use rand::Rng;
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<f64> = candidates.iter().map(|name| self.get(name).weight(prior)).collect();
        let total: f64 = weights.iter().sum();
        let mut draw = rng.gen_range(0.0..total);
        for (candidate, weight) in candidates.iter().zip(weights.iter()) {
            if draw < *weight {
                return Some(candidate);
            }
            draw -= weight;
        }
        candidates.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unattempted_mutator_still_gets_nonzero_weight() {
        let stats = MutatorStats::default();
        assert!(stats.weight(0.1) > 0.0);
    }

    #[test]
    fn successful_mutator_outweighs_a_failing_one() {
        let mut good = MutatorStats::default();
        let mut bad = MutatorStats::default();
        for _ in 0..10 {
            good.record(true);
            bad.record(false);
        }
        assert!(good.weight(0.1) > bad.weight(0.1));
    }
}
