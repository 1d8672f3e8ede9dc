//! The single-threaded iteration driver (§4.7): mode selection, execution,
//! determinism confirmation, the crash pipeline, and minimize-and-insert,
//! all serialized on one logical task stream with no background threads —
//! grounded on `ouros::session::ReplSession::step`, which drives one
//! request to completion (parse, evaluate, trace-dispatch) before its
//! caller is allowed to call it again. Here one `run_iteration` call plays
//! that role for one fuzzing iteration.

use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::FuzzerConfig;
use crate::corpus::Corpus;
use crate::engine::{EngineTracer, FuzzEngine, ProductionMode};
use crate::error::RunnerError;
use crate::evaluator::{CoverageEvaluator, ProgramAspects};
use crate::events::{CrashBehaviour, Event, EventBus, Origin};
use crate::lifter::{Lifter, LifterOptions};
use crate::il::Program;
use crate::minimizer::Minimizer;
use crate::runner::execution::{Execution, Outcome};
use crate::runner::transport::ChildProcessSpec;
use crate::runner::Runner;

pub struct Scheduler {
    engine: FuzzEngine,
    corpus: Corpus,
    evaluator: CoverageEvaluator,
    runner: Runner,
    minimizer: Minimizer,
    lifter: Box<dyn Lifter>,
    events: EventBus,
    config: FuzzerConfig,
    rng: ChaCha8Rng,
    consecutive_empty_iterations: u32,
    initial_generation_done: bool,
    shutdown_reason: Option<String>,
}

impl Scheduler {
    pub fn new(config: FuzzerConfig, spec: Box<dyn ChildProcessSpec>, lifter: Box<dyn Lifter>, edge_count: usize, seed: u64) -> Self {
        let engine = FuzzEngine::new(config.clone());
        let corpus = Corpus::new(config.max_corpus_size, config.min_mutations_per_sample);
        let evaluator = CoverageEvaluator::new(edge_count);
        let runner = Runner::new(spec, config.max_execs_before_respawn, config.max_script_size, config.max_consecutive_failures);
        let minimizer = Minimizer::new(config.minimization_limit);
        let mut events = EventBus::new();
        events.dispatch(Event::Initialized);

        Self {
            engine,
            corpus,
            evaluator,
            runner,
            minimizer,
            lifter,
            events,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            consecutive_empty_iterations: 0,
            initial_generation_done: false,
            shutdown_reason: None,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + 'static) {
        self.events.subscribe(listener);
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn evaluator(&self) -> &CoverageEvaluator {
        &self.evaluator
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_reason.is_some()
    }

    /// Stops the scheduler: dispatches `Shutdown` then `ShutdownComplete`
    /// and prevents any further iteration from doing work. Does not
    /// interrupt an execution already in flight, since `run_iteration`
    /// always runs to completion before returning (§5: no interruption
    /// except via the Runner's own timeout).
    pub fn shutdown(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.events.dispatch(Event::Shutdown { reason: reason.clone() });
        self.shutdown_reason = Some(reason);
        self.events.dispatch(Event::ShutdownComplete);
    }

    fn select_mode(&self) -> ProductionMode {
        if !self.initial_generation_done || self.corpus.is_empty() {
            ProductionMode::Generative
        } else {
            ProductionMode::Mutational
        }
    }

    fn origin_for(&self, mode: ProductionMode) -> Origin {
        match mode {
            ProductionMode::Generative if !self.initial_generation_done => Origin::InitialCorpusGeneration,
            ProductionMode::Generative => Origin::Generative,
            ProductionMode::Mutational => Origin::Mutational,
        }
    }

    /// Consecutive-failure bookkeeping for the initial-corpus warm-up
    /// (§4.7): `N = 100` unproductive iterations in a row hand control
    /// from the forced generative engine back to whatever mode
    /// `select_mode` would otherwise have chosen.
    fn note_empty_iteration(&mut self) {
        if self.initial_generation_done {
            return;
        }
        self.consecutive_empty_iterations += 1;
        if self.consecutive_empty_iterations >= self.config.initial_generation_patience {
            self.initial_generation_done = true;
        }
    }

    fn note_productive_iteration(&mut self) {
        if !self.initial_generation_done {
            self.consecutive_empty_iterations = 0;
        }
    }

    fn produce(&mut self, mode: ProductionMode, tracer: &mut dyn EngineTracer) -> Option<Program> {
        match mode {
            ProductionMode::Generative => self.engine.generate(&mut self.rng, tracer).ok(),
            ProductionMode::Mutational => {
                let parent = self.corpus.random_parent(&mut self.rng)?.clone();
                let donor = self.corpus.random_parent(&mut self.rng).cloned();
                self.engine.mutate(&parent, donor.as_ref(), &mut self.rng, tracer).ok()
            }
        }
    }

    fn execute_once(&mut self, program: &Program, script: &[u8]) -> Result<Execution, RunnerError> {
        self.events.dispatch(Event::PreExecute { program: Rc::new(program.clone()) });
        self.evaluator.clear_bitmap();
        let execution = self.runner.execute(script, self.config.execution_timeout)?;
        self.events.dispatch(Event::PostExecute { execution: Rc::new(execution.clone()) });
        Ok(execution)
    }

    /// Re-executes `program` up to `max_determinism_attempts` times,
    /// narrowing `initial` by intersection each time, and accepts once at
    /// least `min_determinism_attempts` runs in a row agree on the same
    /// stable, non-empty subset (§4.7 step 3). A replay that errors or a
    /// run that loses the aspect entirely fails the whole check, matching
    /// "if convergence fails, discard the candidate".
    fn confirm_deterministic(&mut self, program: &Program, initial: ProgramAspects) -> Option<ProgramAspects> {
        let mut stable = initial;
        let mut converged_runs = 0u32;

        for _ in 0..self.config.max_determinism_attempts {
            if converged_runs >= self.config.min_determinism_attempts {
                break;
            }
            let script = self.lifter.lift(program, &LifterOptions::default());
            let execution = self.execute_once(program, script.as_bytes()).ok()?;
            match self.evaluator.compute_aspect_intersection(program, &stable) {
                Some(narrowed) if narrowed == stable => converged_runs += 1,
                Some(narrowed) => {
                    stable = narrowed;
                    converged_runs = 0;
                }
                None => return None,
            }
            let _ = execution;
        }

        if converged_runs >= self.config.min_determinism_attempts {
            Some(stable)
        } else {
            None
        }
    }

    /// Minimizer → re-execute → `evaluateCrash` → `CrashFound` (§4.7 step
    /// 4). `is_unique` comes from whether `evaluate_crash` reports a
    /// previously-unseen crash signature for the *original* execution,
    /// before minimization narrows the program down further.
    fn handle_crash(&mut self, program: &Program, original_execution: &Execution, origin: Origin) {
        let is_unique = self.evaluator.evaluate_crash(original_execution).is_some();

        let minimizer = &self.minimizer;
        let runner = &mut self.runner;
        let lifter = &self.lifter;
        let timeout = self.config.execution_timeout;
        let minimized = minimizer.minimize(program, |candidate| {
            let script = lifter.lift(candidate, &LifterOptions::default());
            matches!(runner.execute(script.as_bytes(), timeout), Ok(exec) if exec.is_crash())
        });

        let attempts = self.config.min_determinism_attempts.max(1);
        let mut crash_count = 0u32;
        for _ in 0..attempts {
            let script = self.lifter.lift(&minimized, &LifterOptions::default());
            if matches!(self.runner.execute(script.as_bytes(), self.config.execution_timeout), Ok(exec) if exec.is_crash()) {
                crash_count += 1;
            }
        }
        let behaviour = if crash_count == attempts { CrashBehaviour::Deterministic } else { CrashBehaviour::Flaky };

        self.events.dispatch(Event::CrashFound { program: Rc::new(minimized), behaviour, is_unique, origin });
    }

    /// Runs exactly one fuzzing iteration: produce, execute, evaluate,
    /// and (depending on outcome) confirm-and-insert or crash-report. A
    /// no-op once `shutdown` has been called. Returns the fatal
    /// `RunnerError` that should stop the caller's loop, if any — every
    /// other failure mode (a rejected mutation, a non-converging
    /// determinism check) is handled internally as "discard and move on".
    pub fn run_iteration(&mut self, tracer: &mut dyn EngineTracer) -> Result<(), RunnerError> {
        if self.is_shutdown() {
            return Ok(());
        }

        let mode = self.select_mode();
        let origin = self.origin_for(mode);
        let Some(program) = self.produce(mode, tracer) else {
            self.note_empty_iteration();
            return Ok(());
        };

        self.events.dispatch(Event::ProgramGenerated { program: Rc::new(program.clone()) });
        let script = self.lifter.lift(&program, &LifterOptions::default());
        let execution = self.execute_once(&program, script.as_bytes())?;
        tracer.on_execution(&program, execution.is_success());

        match execution.outcome {
            Outcome::Crashed { .. } => {
                self.handle_crash(&program, &execution, origin);
                self.note_productive_iteration();
            }
            Outcome::Succeeded => {
                self.events.dispatch(Event::ValidProgramFound);
                match self.evaluator.evaluate(&execution) {
                    Some(aspects) => match self.confirm_deterministic(&program, aspects) {
                        Some(confirmed) => {
                            self.events.dispatch(Event::InterestingProgramFound {
                                program: Rc::new(program.clone()),
                                origin,
                                aspects: confirmed.clone(),
                            });
                            let minimized = self.minimize_for_coverage(&program, &confirmed);
                            self.corpus.add(minimized, confirmed);
                            self.note_productive_iteration();
                        }
                        None => self.note_empty_iteration(),
                    },
                    None => self.note_empty_iteration(),
                }
            }
            Outcome::Failed(_) => {
                self.events.dispatch(Event::InvalidProgramFound);
                self.note_empty_iteration();
            }
            Outcome::TimedOut => {
                self.events.dispatch(Event::TimeOutFound);
                self.note_empty_iteration();
            }
        }
        Ok(())
    }

    fn minimize_for_coverage(&mut self, program: &Program, aspects: &ProgramAspects) -> Program {
        let minimizer = &self.minimizer;
        let runner = &mut self.runner;
        let evaluator = &mut self.evaluator;
        let lifter = &self.lifter;
        let timeout = self.config.execution_timeout;
        minimizer.minimize(program, |candidate| {
            let script = lifter.lift(candidate, &LifterOptions::default());
            evaluator.clear_bitmap();
            match runner.execute(script.as_bytes(), timeout) {
                Ok(execution) => evaluator.has_aspects(&execution, aspects),
                Err(_) => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopTracer;
    use crate::lifter::NullLifter;
    use crate::runner::reprl::StatusWord;
    use crate::runner::transport::{DummySpec, ScriptedResponse};
    use std::rc::Rc as StdRc;
    use std::time::Duration;

    fn always_succeeds_spec() -> Box<dyn ChildProcessSpec> {
        let responses = StdRc::new(
            (0..10_000)
                .map(|_| ScriptedResponse {
                    status_word: StatusWord::encode(Outcome::Succeeded, false),
                    stdout: String::new(),
                    stderr: String::new(),
                    delay: Duration::ZERO,
                })
                .collect::<Vec<_>>(),
        );
        Box::new(DummySpec { responses_factory: StdRc::new(move || (*responses).clone()) })
    }

    #[test]
    fn an_iteration_runs_without_crashing_the_process() {
        let mut scheduler = Scheduler::new(FuzzerConfig::default(), always_succeeds_spec(), Box::new(NullLifter), 64, 7);
        let mut tracer = NoopTracer;
        assert!(scheduler.run_iteration(&mut tracer).is_ok());
    }

    #[test]
    fn shutdown_dispatches_the_lifecycle_events_and_stops_iteration() {
        let mut scheduler = Scheduler::new(FuzzerConfig::default(), always_succeeds_spec(), Box::new(NullLifter), 64, 7);
        let seen = StdRc::new(std::cell::RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        scheduler.subscribe(move |event| {
            seen2.borrow_mut().push(format!("{event:?}"));
        });
        scheduler.shutdown("test requested stop");
        assert!(scheduler.is_shutdown());
        let before = seen.borrow().len();

        let mut tracer = NoopTracer;
        scheduler.run_iteration(&mut tracer).unwrap();
        assert_eq!(seen.borrow().len(), before, "no further events after shutdown");
    }

    #[test]
    fn initial_generation_patience_eventually_hands_back_to_mutational_mode() {
        let mut config = FuzzerConfig::default();
        config.initial_generation_patience = 3;
        let mut scheduler = Scheduler::new(config, always_succeeds_spec(), Box::new(NullLifter), 64, 7);
        assert_eq!(scheduler.select_mode(), ProductionMode::Generative);
        for _ in 0..5 {
            scheduler.note_empty_iteration();
        }
        assert!(scheduler.initial_generation_done);
    }
}
