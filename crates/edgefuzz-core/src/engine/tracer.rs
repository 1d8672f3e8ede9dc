//! Observation hook for the fuzzing engine, mirroring the teacher's
//! `VmTracer` seam: production code drives the engine with [`NoopTracer`],
//! tests substitute a recording double to assert on which mutator/generator
//! produced which candidate without coupling to `FuzzEngine`'s internals.

use crate::il::Program;

/// What happened to a mutation attempt, passed to [`EngineTracer::on_mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Accepted,
    Rejected,
}

pub trait EngineTracer {
    /// Called once per mutation attempt, after validation, before the
    /// candidate is (or isn't) folded back into the corpus.
    fn on_mutation(&mut self, mutator_name: &str, outcome: MutationOutcome) {
        let _ = (mutator_name, outcome);
    }

    /// Called once per generator invocation during generative-mode building.
    fn on_generation(&mut self, generator_name: &str) {
        let _ = generator_name;
    }

    /// Called when a program finishes executing and is handed to the
    /// evaluator for coverage feedback.
    fn on_execution(&mut self, program: &Program, is_interesting: bool) {
        let _ = (program, is_interesting);
    }
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl EngineTracer for NoopTracer {}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingTracer {
        pub mutations: Vec<(String, MutationOutcome)>,
        pub generations: Vec<String>,
        pub executions: Vec<bool>,
    }

    impl EngineTracer for RecordingTracer {
        fn on_mutation(&mut self, mutator_name: &str, outcome: MutationOutcome) {
            self.mutations.push((mutator_name.to_string(), outcome));
        }

        fn on_generation(&mut self, generator_name: &str) {
            self.generations.push(generator_name.to_string());
        }

        fn on_execution(&mut self, _program: &Program, is_interesting: bool) {
            self.executions.push(is_interesting);
        }
    }
}
