//! `FuzzEngine`: the per-iteration decision maker that picks generative vs.
//! mutational mode, applies 2-5 consecutive mutations, and feeds back
//! success/failure to the weighted mutator selection (§4.2).
//!
//! Grounded on the teacher's single-threaded, no-background-thread driver
//! style (`ouros::session::ReplSession::step`): `FuzzEngine::produce` is
//! called once per scheduler iteration and returns at most one candidate
//! program, never spawning work of its own.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::FuzzerConfig;
use crate::error::MutationError;
use crate::il::{Builder, Program};

use super::context_graph::ContextGraph;
use super::generators::{default_generators, CodeGenerator};
use super::mutators::{default_mutators, MutationContext, Mutator};
use super::stats::StatsTable;
use super::tracer::{EngineTracer, MutationOutcome};
use super::value_type::{infer_variable_types, type_of};

/// How a produced program came to be, attached to `Event::ProgramGenerated`
/// by the scheduler via `Origin` (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionMode {
    Generative,
    Mutational,
}

/// A program the engine just produced, tagged with how it got built so the
/// scheduler can report `Origin` correctly and the corpus can record which
/// mutators contributed when the program later turns out interesting.
#[derive(Debug, Clone)]
pub struct Produced {
    pub program: Program,
    pub mode: ProductionMode,
}

/// Prior added to every mutator's weight so unattempted mutators are still
/// sampled occasionally (§4.2's "never fully starve a mutator").
const WEIGHT_PRIOR: f64 = 0.05;

pub struct FuzzEngine {
    generators: Vec<CodeGenerator>,
    mutators: Vec<Box<dyn Mutator>>,
    context_graph: ContextGraph,
    stats: StatsTable,
    config: FuzzerConfig,
}

impl FuzzEngine {
    pub fn new(config: FuzzerConfig) -> Self {
        let generators = default_generators();
        let context_graph = ContextGraph::build(&generators);
        Self { generators, mutators: default_mutators(), context_graph, stats: StatsTable::default(), config }
    }

    pub fn context_graph(&self) -> &ContextGraph {
        &self.context_graph
    }

    /// Builds a fresh program from scratch using the generator catalog,
    /// up to `generation_instruction_budget` instructions, honoring context
    /// reachability via `ContextGraph` when a generator requires a context
    /// the empty program doesn't yet satisfy.
    pub fn generate(&self, rng: &mut ChaCha8Rng, tracer: &mut dyn EngineTracer) -> Result<Program, MutationError> {
        let mut builder = Builder::new();
        let budget = self.config.generation_instruction_budget;

        while (builder.instruction_count() as u32) < budget {
            let current = builder.current_context();
            let fitting: Vec<&CodeGenerator> =
                self.generators.iter().filter(|g| current.contains(g.required_context)).collect();
            let generator = if fitting.is_empty() {
                match self.reach_any_generator(&mut builder, rng) {
                    Some(name) => self.generators.iter().find(|g| g.name == name),
                    None => None,
                }
            } else {
                Some(fitting[rng.gen_range(0..fitting.len())])
            };
            let Some(generator) = generator else { break };

            let types = infer_variable_types(builder.instructions());
            let mut inputs = Vec::with_capacity(generator.input_types.len());
            let mut ok = true;
            for &want in &generator.input_types {
                let visible: Vec<_> =
                    builder.instructions().iter().flat_map(|i| i.all_outputs()).filter(|v| type_of(&types, *v).is_compatible_with(want)).collect();
                if visible.is_empty() {
                    ok = false;
                    break;
                }
                inputs.push(visible[rng.gen_range(0..visible.len())]);
            }
            if !ok {
                continue;
            }
            if generator.invoke(&mut builder, &inputs, rng).is_ok() {
                tracer.on_generation(generator.name);
            }
        }

        builder.finalize().map_err(MutationError::Build)
    }

    /// When no generator fits the current context, walks `ContextGraph`
    /// toward any reachable context and realizes one hop, returning the
    /// name of the generator that opened it.
    fn reach_any_generator(&self, builder: &mut Builder, rng: &mut ChaCha8Rng) -> Option<&'static str> {
        let current = builder.current_context();
        for generator in &self.generators {
            if let Some(path) = self.context_graph.find_path(current, generator.required_context) {
                if path.is_empty() {
                    continue;
                }
                let providers = ContextGraph::realize_path(&path, rng);
                return providers.first().copied();
            }
        }
        None
    }

    /// Applies between `consecutive_mutations.0` and `.1` mutations to
    /// `parent`, weighting mutator choice by [`StatsTable`] and recording
    /// each attempt's outcome. Stops early and returns the best candidate
    /// obtained so far if every remaining attempt in a round fails.
    pub fn mutate(
        &mut self,
        parent: &Program,
        donor: Option<&Program>,
        rng: &mut ChaCha8Rng,
        tracer: &mut dyn EngineTracer,
    ) -> Result<Program, MutationError> {
        let (low, high) = self.config.consecutive_mutations;
        let rounds = rng.gen_range(low..=high);
        let mut current = parent.clone();

        for _ in 0..rounds {
            let names: Vec<&'static str> = self.mutators.iter().map(|m| m.name()).collect();
            let Some(chosen_name) = self.stats.weighted_choice(&names, WEIGHT_PRIOR, rng) else { break };
            let mutator = self.mutators.iter().find(|m| m.name() == chosen_name).expect("name came from this list");

            let mut ctx = MutationContext {
                rng: &mut *rng,
                generators: &self.generators,
                donor,
                instruction_budget: self.config.generation_instruction_budget,
            };
            match mutator.mutate(&current, &mut ctx) {
                Ok(candidate) => {
                    self.stats.record(chosen_name, true);
                    tracer.on_mutation(chosen_name, MutationOutcome::Accepted);
                    current = candidate;
                }
                Err(_err) => {
                    self.stats.record(chosen_name, false);
                    tracer.on_mutation(chosen_name, MutationOutcome::Rejected);
                }
            }
        }

        Ok(current)
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tracer::NoopTracer;
    use rand::SeedableRng;

    #[test]
    fn generate_respects_the_instruction_budget() {
        let mut config = FuzzerConfig::default();
        config.generation_instruction_budget = 5;
        let engine = FuzzEngine::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut tracer = NoopTracer;
        let program = engine.generate(&mut rng, &mut tracer).unwrap();
        assert!(program.len() <= 5);
    }

    #[test]
    fn mutate_returns_a_valid_program_even_if_every_attempt_fails() {
        let mut engine = FuzzEngine::new(FuzzerConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut tracer = NoopTracer;
        let seed = engine.generate(&mut rng, &mut tracer).unwrap();
        let mutated = engine.mutate(&seed, None, &mut rng, &mut tracer).unwrap();
        assert!(mutated.validate().is_ok());
    }
}
