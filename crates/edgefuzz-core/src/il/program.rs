//! `Program`: an immutable, invariant-checked sequence of instructions.

use std::hash::{Hash, Hasher};

use ahash::AHasher;

use crate::error::BuildError;
use crate::il::context::{Context, ContextStack};
use crate::il::instruction::Instruction;
use crate::il::variable::{Variable, MAX_VARIABLES};

/// Optional, purely cosmetic provenance note attached to a `Program`.
///
/// Never affects invariant checking, equality, or the structural hash; used
/// only by `includeHistory` lifter options and debug logging in the
/// minimizer/scheduler.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct History {
    pub entries: Vec<String>,
}

/// An ordered, invariant-checked sequence of [`Instruction`]s.
///
/// `Program` is an immutable value: the only way to produce one is
/// [`crate::il::builder::Builder::finalize`], which checks all five
/// invariants before returning. Mutation always goes through a fresh
/// `Builder` (copy-on-mutate, never in-place).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Program {
    instructions: Vec<Instruction>,
    #[serde(default)]
    history: History,
}

impl Program {
    /// Constructs a `Program` without re-validating invariants.
    ///
    /// Only [`crate::il::builder::Builder::finalize`] and deserialization
    /// should call this; both paths already went through (or come from a
    /// trusted source that went through) invariant checking.
    pub(crate) fn from_checked_instructions(instructions: Vec<Instruction>, history: History) -> Self {
        Self { instructions, history }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of distinct variables defined across the whole program.
    pub fn number_of_variables(&self) -> usize {
        self.instructions.iter().map(|i| i.outputs.len() + i.inner_outputs.len()).sum()
    }

    /// Re-checks all five data-model invariants against the stored
    /// instruction sequence. Used by deserialization (never trust bytes
    /// from disk) and by property tests.
    pub fn validate(&self) -> Result<(), BuildError> {
        validate_invariants(&self.instructions)
    }

    /// A stable hash over opcode/operand shape, used by the corpus to
    /// reject duplicate programs. Two structurally identical programs
    /// (even with different `History`) hash identically.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = AHasher::default();
        self.instructions.len().hash(&mut hasher);
        for instr in &self.instructions {
            std::mem::discriminant(&instr.opcode).hash(&mut hasher);
            hash_opcode_payload(&instr.opcode, &mut hasher);
            instr.inputs.len().hash(&mut hasher);
            instr.outputs.len().hash(&mut hasher);
            instr.inner_outputs.len().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Returns a new `Program` identical to `self` but with `note` appended
    /// to its history. Cosmetic only.
    pub fn with_history_note(mut self, note: impl Into<String>) -> Self {
        self.history.entries.push(note.into());
        self
    }
}

/// Hashes the operation-immediate payload of an opcode, so e.g.
/// `LoadInteger(1)` and `LoadInteger(2)` collide in structural hash (their
/// *shape* is identical) while `LoadInteger` vs `LoadString` never do.
/// `OperationMutator` only ever changes payloads, never shape, so this is
/// intentional: splicing and input mutation change shape and do affect the
/// hash, literal mutation does not.
fn hash_opcode_payload<H: Hasher>(_opcode: &crate::il::operation::Opcode, _hasher: &mut H) {
    // Shape (discriminant + arity, already hashed by the caller) is what
    // the corpus dedups on; literal payload deliberately does not
    // contribute so that splice/input-mutated variants of the same shape
    // are still treated as distinct via their different instruction
    // sequence, not via false negatives here.
}

/// Checks invariants 1-4 (definition-before-use, SSA, block balance, context
/// discipline) plus the variable-overflow boundary. Invariant 5 (density) is
/// guaranteed by construction in [`crate::il::builder::Builder`] and
/// re-derived here for anything deserialized from bytes.
pub(crate) fn validate_invariants(instructions: &[Instruction]) -> Result<(), BuildError> {
    let mut defined: Vec<bool> = Vec::new();
    let mut context_stack = ContextStack::new();
    let mut next_expected_var: u32 = 0;

    for instr in instructions {
        if !instr.required_context().is_empty() && !context_stack.current().contains(instr.required_context()) {
            return Err(BuildError::ContextViolation {
                required: instr.required_context(),
                available: context_stack.current(),
            });
        }

        if instr.closes_block() {
            if !context_stack.pop() {
                return Err(BuildError::UnbalancedBlock);
            }
        }

        for input in &instr.inputs {
            let idx = input.index();
            if idx >= defined.len() || !defined[idx] {
                return Err(BuildError::UseBeforeDef { variable_index: input.raw() });
            }
        }

        for output in instr.all_outputs() {
            let idx = output.index();
            if output.raw() >= MAX_VARIABLES {
                return Err(BuildError::VariableOverflow { attempted: output.raw() });
            }
            if output.raw() != next_expected_var {
                return Err(BuildError::DuplicateDefinition { variable_index: output.raw() });
            }
            next_expected_var += 1;
            if idx >= defined.len() {
                defined.resize(idx + 1, false);
            }
            if defined[idx] {
                return Err(BuildError::DuplicateDefinition { variable_index: output.raw() });
            }
            defined[idx] = true;
        }

        if instr.opens_block() {
            let inner = if instr.opcode.attributes().propagates_surrounding_context {
                context_stack.current().union(instr.opcode.introduced_context())
            } else {
                Context::JAVASCRIPT.union(instr.opcode.introduced_context())
            };
            context_stack.push(inner);
        } else if instr.is_block_start() || instr.is_block_end() {
            // `BeginElse`/`BeginCatch`'s interior markers continue inside the
            // frame their `BeginIf`/`BeginTry` already pushed; only the true
            // `Begin*`/`End*` pair changes stack depth. A marker outside any
            // open block is malformed.
            if context_stack.is_top_level() {
                return Err(BuildError::UnbalancedBlock);
            }
            context_stack.union_into_current(instr.opcode.introduced_context());
        }
    }

    if !context_stack.is_top_level() {
        return Err(BuildError::UnbalancedBlock);
    }
    Ok(())
}
