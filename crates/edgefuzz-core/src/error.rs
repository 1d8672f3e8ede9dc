//! Error types for every component, one enum each.
//!
//! Follows the teacher's style (`ReplError`, `SessionError`): hand-written
//! `Display` + `std::error::Error` + `From` conversions, no `thiserror`.
//! Transient runtime outcomes (a crash, a timeout) are *not* errors — they
//! are ordinary values carried in [`crate::runner::execution::Execution`].
//! These enums are reserved for the failure categories spec.md §7 calls out
//! as `BuildInvariantViolation`, `ExecutionFailure`,
//! `EvaluatorStateIncompatibility`, `SerializationError`, and
//! `InitializationError`.

use std::fmt;

/// A structural-invariant violation detected while building a [`Program`](crate::il::program::Program).
///
/// Recoverable locally: mutators that hit this discard the candidate and
/// record a failure against themselves (§4.2); outside a mutator, it is
/// fatal (debug builds should `panic!`, release builds should propagate
/// this value and abort the enclosing build, never truncate silently).
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Variable counter would exceed [`crate::il::variable::MAX_VARIABLES`].
    VariableOverflow { attempted: u32 },
    /// An instruction referenced a variable not defined by an earlier
    /// instruction in an enclosing scope.
    UseBeforeDef { variable_index: u32 },
    /// An instruction's opcode requires context not satisfied at its
    /// position.
    ContextViolation { required: crate::il::context::Context, available: crate::il::context::Context },
    /// Block-open/close opcodes are not balanced (e.g. `finalize()` called
    /// with open blocks, or a close without a matching open).
    UnbalancedBlock,
    /// An instruction's input/output count does not match its opcode's
    /// static arity.
    ArityMismatch { opcode: String },
    /// A variable number was reused as an output of more than one
    /// instruction (SSA violation).
    DuplicateDefinition { variable_index: u32 },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VariableOverflow { attempted } => {
                write!(f, "build aborted: variable count {attempted} exceeds maximum")
            }
            Self::UseBeforeDef { variable_index } => {
                write!(f, "build aborted: v{variable_index} used before definition")
            }
            Self::ContextViolation { required, available } => {
                write!(f, "build aborted: requires context [{required}], available [{available}]")
            }
            Self::UnbalancedBlock => write!(f, "build aborted: unbalanced block nesting"),
            Self::ArityMismatch { opcode } => write!(f, "build aborted: arity mismatch for {opcode}"),
            Self::DuplicateDefinition { variable_index } => {
                write!(f, "build aborted: v{variable_index} defined more than once")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Failure category for the REPRL execution driver: the driver could not
/// carry out the request at all (distinct from a normal crash/timeout
/// outcome, which lives in `Execution::outcome`).
#[derive(Debug, Clone)]
pub enum RunnerError {
    /// The child process could not be spawned after exhausting retries.
    SpawnFailed { attempts: u32, message: String },
    /// A control- or data-channel pipe operation failed.
    PipeBroken(String),
    /// The child wrote a status word of unexpected shape.
    MalformedStatusWord(u32),
    /// Consecutive execution failures exceeded the configured limit;
    /// the fuzzer must stop.
    TooManyConsecutiveFailures { limit: u32 },
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { attempts, message } => {
                write!(f, "failed to spawn child after {attempts} attempts: {message}")
            }
            Self::PipeBroken(message) => write!(f, "REPRL pipe broken: {message}"),
            Self::MalformedStatusWord(word) => write!(f, "malformed REPRL status word: {word:#010x}"),
            Self::TooManyConsecutiveFailures { limit } => {
                write!(f, "aborting: {limit} consecutive execution failures")
            }
        }
    }
}

impl std::error::Error for RunnerError {}

/// Failure category for the coverage evaluator.
#[derive(Debug, Clone)]
pub enum EvaluatorError {
    /// Imported bitmap state does not match the local bitmap size.
    StateSizeMismatch { local: usize, imported: usize },
    /// Shared-memory region could not be allocated at initialization.
    /// Always fatal.
    SharedMemoryInit(String),
}

impl fmt::Display for EvaluatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateSizeMismatch { local, imported } => {
                write!(f, "evaluator state incompatible: local bitmap is {local} bytes, imported is {imported}")
            }
            Self::SharedMemoryInit(message) => write!(f, "shared memory initialization failed: {message}"),
        }
    }
}

impl std::error::Error for EvaluatorError {}

/// Malformed on-disk program data, surfaced to the corpus importer which
/// skips the offending sample with a warning rather than aborting.
#[derive(Debug)]
pub enum SerializationError {
    Postcard(postcard::Error),
    /// The format-version byte prefix did not match what this binary
    /// writes; the bytes may be from an incompatible future version.
    VersionMismatch { expected: u8, found: u8 },
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postcard(err) => write!(f, "malformed program bytes: {err}"),
            Self::VersionMismatch { expected, found } => {
                write!(f, "unsupported serialization format version {found} (expected {expected})")
            }
        }
    }
}

impl std::error::Error for SerializationError {}

impl From<postcard::Error> for SerializationError {
    fn from(err: postcard::Error) -> Self {
        Self::Postcard(err)
    }
}

/// Corpus-level error, e.g. wrapping a `SerializationError` during import.
#[derive(Debug)]
pub enum CorpusError {
    Serialization(SerializationError),
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CorpusError {}

impl From<SerializationError> for CorpusError {
    fn from(err: SerializationError) -> Self {
        Self::Serialization(err)
    }
}

/// Failure category for a single mutator/generator invocation (§4.2).
/// Distinct from `BuildError`: these are expected, routine outcomes a
/// mutator records against itself and moves on from, not process-fatal.
#[derive(Debug)]
pub enum MutationError {
    /// The candidate would have violated an IL invariant; discarded.
    Build(BuildError),
    /// A mutator needing a donor program (splice, combine) had none
    /// available, e.g. the corpus holds only the program being mutated.
    NoDonorAvailable,
    /// No instruction in the target had an input slot with a visible,
    /// compatible replacement variable.
    NoCompatibleInput,
    /// No code generator's `requiredContext` was satisfied at the chosen
    /// insertion point, or a requested target context was unreachable.
    NoGeneratorFits,
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build(err) => write!(f, "mutation discarded: {err}"),
            Self::NoDonorAvailable => write!(f, "mutation skipped: no donor program available"),
            Self::NoCompatibleInput => write!(f, "mutation skipped: no compatible input found"),
            Self::NoGeneratorFits => write!(f, "mutation skipped: no generator fits the current context"),
        }
    }
}

impl std::error::Error for MutationError {}

impl From<BuildError> for MutationError {
    fn from(err: BuildError) -> Self {
        Self::Build(err)
    }
}

/// Fatal configuration/initialization failure (shared memory, child spawn
/// argv resolution). Terminates the process; never recovered from.
#[derive(Debug, Clone)]
pub struct InitializationError(pub String);

impl fmt::Display for InitializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "initialization failed: {}", self.0)
    }
}

impl std::error::Error for InitializationError {}
