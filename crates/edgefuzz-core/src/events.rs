//! The fuzzer's closed event enumeration and its synchronous dispatcher.
//!
//! Modeled on `ouros::tracer::TraceEvent`: a closed enum of "things that
//! happened", observed by listeners that run to completion before the
//! dispatcher returns (§5, §9 — event dispatch is never re-entrant across
//! an async boundary, only synchronously by a listener that itself
//! dispatches further events).

use std::fmt;
use std::rc::Rc;

use crate::evaluator::ProgramAspects;
use crate::il::Program;
use crate::runner::execution::Execution;

/// Where a crash or interesting program originated from, for event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Generative,
    Mutational,
    InitialCorpusGeneration,
}

/// Whether a crash reproduced on every replay or only sometimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashBehaviour {
    Deterministic,
    Flaky,
}

/// Severity for [`Event::Log`], matching the levels a `StderrLogSink`
/// prints (`ouros::tracer::StderrTracer` has no levels; this is the
/// fuzzer's own small addition since the spec names a `level` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// The closed set of events the scheduler dispatches over one iteration.
#[derive(Debug, Clone)]
pub enum Event {
    Initialized,
    Shutdown { reason: String },
    ShutdownComplete,
    PreExecute { program: Rc<Program> },
    PostExecute { execution: Rc<Execution> },
    ProgramGenerated { program: Rc<Program> },
    ValidProgramFound,
    InvalidProgramFound,
    TimeOutFound,
    InterestingProgramFound { program: Rc<Program>, origin: Origin, aspects: ProgramAspects },
    CrashFound { program: Rc<Program>, behaviour: CrashBehaviour, is_unique: bool, origin: Origin },
    Log { origin: &'static str, level: LogLevel, label: String, message: String },
}

/// Synchronous, single-threaded event dispatcher.
///
/// Listeners are plain `FnMut(&Event)` closures. Dispatch order is
/// insertion order; a listener that dispatches further events does so
/// synchronously and those nested dispatches run to completion before
/// control returns to the outer dispatch loop — documented here rather
/// than enforced, since Rust's borrow checker already prevents a listener
/// from re-entering `EventBus::dispatch` on the same `&mut self` while it
/// is running.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn FnMut(&Event)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn dispatch(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Default stderr sink for [`Event::Log`], in the style of
/// `ouros::tracer::StderrTracer`'s `[ip] opcode ...` formatting.
pub fn stderr_log_sink(event: &Event) {
    if let Event::Log { origin, level, label, message } = event {
        eprintln!("[{origin}][{level}] {label}: {message}");
    }
}
