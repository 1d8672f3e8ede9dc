//! Incremental `Program` construction with invariant enforcement.

use std::collections::HashMap;

use crate::error::BuildError;
use crate::il::context::{Context, ContextStack};
use crate::il::instruction::Instruction;
use crate::il::operation::Opcode;
use crate::il::program::{History, Program};
use crate::il::variable::{Variable, MAX_VARIABLES};

/// Result of [`Builder::scope_lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLookup {
    InScope(Variable),
    NotFound,
}

/// One lexical scope: the identifier-to-variable bindings visible while
/// inside the block this scope belongs to. Mirrors the dense, non-reused
/// index discipline of `ouros::namespace::Namespaces`, but keyed by
/// textual identifier rather than slot, since identifiers are only used
/// during source→IL compilation and splicing (never inside the IL itself).
#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Variable>,
    /// All variables defined anywhere inside this scope (bound or not),
    /// in definition order; backs `visible_variables`.
    defined: Vec<Variable>,
}

/// Incrementally constructs a [`Program`] while maintaining all §3
/// invariants as instructions are emitted.
///
/// `Builder` is single-use: call [`Builder::finalize`] once construction is
/// complete. Every public method that could violate an invariant returns a
/// [`BuildError`] instead of panicking, so mutators can catch it, discard
/// the candidate, and record a failure against themselves (§4.2) rather
/// than aborting the whole fuzzing process — matching the "fatal in debug,
/// well-defined build-aborted signal in release" split from §4.1.
#[derive(Debug)]
pub struct Builder {
    instructions: Vec<Instruction>,
    next_variable: u32,
    context_stack: ContextStack,
    scopes: Vec<Scope>,
    history: History,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            next_variable: 0,
            context_stack: ContextStack::new(),
            scopes: vec![Scope::default()],
            history: History::default(),
        }
    }

    /// The union of context frames currently active.
    pub fn current_context(&self) -> Context {
        self.context_stack.current()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn next_variable_count(&self) -> u32 {
        self.next_variable
    }

    /// Instructions emitted so far. Read-only: mutators inspect this to
    /// infer variable types and pick splice/combine insertion points, but
    /// the only way to append is `emit`/`open_block`/`close_block`.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn alloc_variable(&mut self) -> Result<Variable, BuildError> {
        if self.next_variable >= MAX_VARIABLES {
            return Err(BuildError::VariableOverflow { attempted: self.next_variable });
        }
        let v = Variable::new(self.next_variable);
        self.next_variable += 1;
        Ok(v)
    }

    /// Appends an instruction for `opcode` reading `inputs`, allocating and
    /// returning fresh output variables. Rejects the call if `opcode`'s
    /// `required_context` is not currently satisfied, or if `inputs` does
    /// not satisfy the opcode's static arity.
    pub fn emit(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> Result<Vec<Variable>, BuildError> {
        let attrs = opcode.attributes();
        if attrs.opens_block || attrs.closes_block {
            return Err(BuildError::ArityMismatch {
                opcode: format!("{opcode:?} must be emitted via open_block/close_block"),
            });
        }
        if attrs.is_block_start || attrs.is_block_end {
            return Err(BuildError::ArityMismatch { opcode: format!("{opcode:?} must be emitted via begin_interior") });
        }
        self.check_context(&opcode)?;
        let arity = opcode.arity();
        if !arity.accepts_input_count(inputs.len()) {
            return Err(BuildError::ArityMismatch { opcode: format!("{opcode:?}") });
        }
        for input in &inputs {
            if input.raw() >= self.next_variable {
                return Err(BuildError::UseBeforeDef { variable_index: input.raw() });
            }
        }

        let mut outputs = Vec::with_capacity(arity.output_count() as usize);
        for _ in 0..arity.output_count() {
            outputs.push(self.alloc_variable()?);
        }
        let instr = Instruction::new(opcode, inputs, outputs.clone(), Vec::new());
        self.append(instr, attrs.opens_block, attrs.closes_block, false);
        Ok(outputs)
    }

    /// Emits a block-opening instruction, pushing a new context frame and
    /// a new lexical scope. Returns the instruction's inner outputs
    /// (parameters, loop induction variables, the caught exception
    /// binding, ...), which live only inside the opened block.
    pub fn open_block(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> Result<Vec<Variable>, BuildError> {
        self.check_context(&opcode)?;
        let arity = opcode.arity();
        if !arity.accepts_input_count(inputs.len()) {
            return Err(BuildError::ArityMismatch { opcode: format!("{opcode:?}") });
        }
        for input in &inputs {
            if input.raw() >= self.next_variable {
                return Err(BuildError::UseBeforeDef { variable_index: input.raw() });
            }
        }

        let mut outputs = Vec::with_capacity(arity.output_count() as usize);
        for _ in 0..arity.output_count() {
            outputs.push(self.alloc_variable()?);
        }
        let mut inner_outputs = Vec::with_capacity(arity.inner_output_count() as usize);
        for _ in 0..arity.inner_output_count() {
            inner_outputs.push(self.alloc_variable()?);
        }

        let inner_context = if opcode.attributes().propagates_surrounding_context {
            self.current_context().union(opcode.introduced_context())
        } else {
            Context::JAVASCRIPT.union(opcode.introduced_context())
        };

        let instr = Instruction::new(opcode, inputs, outputs.clone(), inner_outputs.clone());
        self.instructions.push(instr);
        self.context_stack.push(inner_context);
        self.scopes.push(Scope::default());
        for v in &inner_outputs {
            self.bind_in_current_scope(*v);
        }
        Ok(inner_outputs)
    }

    /// Emits an interior block marker (`BeginCatch`, `BeginElse`): continues
    /// inside the frame and scope the enclosing `open_block` call already
    /// pushed, rather than pushing a new one of its own. Only the balanced
    /// `open_block`/`close_block` pair around it changes stack depth.
    ///
    /// Allocates and binds this marker's inner outputs (e.g. `BeginCatch`'s
    /// caught-exception variable) into the current scope, and folds the
    /// opcode's `introduced_context` (e.g. `catch`) into the current frame so
    /// subsequent instructions up to the matching close see it.
    pub fn begin_interior(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> Result<Vec<Variable>, BuildError> {
        if self.context_stack.is_top_level() {
            return Err(BuildError::UnbalancedBlock);
        }
        self.check_context(&opcode)?;
        let arity = opcode.arity();
        if !arity.accepts_input_count(inputs.len()) {
            return Err(BuildError::ArityMismatch { opcode: format!("{opcode:?}") });
        }
        for input in &inputs {
            if input.raw() >= self.next_variable {
                return Err(BuildError::UseBeforeDef { variable_index: input.raw() });
            }
        }

        let mut inner_outputs = Vec::with_capacity(arity.inner_output_count() as usize);
        for _ in 0..arity.inner_output_count() {
            inner_outputs.push(self.alloc_variable()?);
        }

        self.context_stack.union_into_current(opcode.introduced_context());
        let instr = Instruction::new(opcode, inputs, Vec::new(), inner_outputs.clone());
        self.instructions.push(instr);
        for v in &inner_outputs {
            self.bind_in_current_scope(*v);
        }
        Ok(inner_outputs)
    }

    /// Emits a block-closing instruction, popping the context frame and
    /// lexical scope pushed by the matching [`Builder::open_block`] call.
    pub fn close_block(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> Result<(), BuildError> {
        if self.context_stack.is_top_level() {
            return Err(BuildError::UnbalancedBlock);
        }
        for input in &inputs {
            if input.raw() >= self.next_variable {
                return Err(BuildError::UseBeforeDef { variable_index: input.raw() });
            }
        }
        let instr = Instruction::new(opcode, inputs, Vec::new(), Vec::new());
        self.instructions.push(instr);
        self.context_stack.pop();
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        Ok(())
    }

    fn check_context(&self, opcode: &Opcode) -> Result<(), BuildError> {
        let required = opcode.required_context();
        if !required.is_empty() && !self.current_context().contains(required) {
            return Err(BuildError::ContextViolation { required, available: self.current_context() });
        }
        Ok(())
    }

    fn append(&mut self, instr: Instruction, opens: bool, closes: bool, _is_else: bool) {
        debug_assert!(!opens && !closes, "block-structured opcodes must go through open_block/close_block");
        self.instructions.push(instr);
        for v in instr_outputs(self.instructions.last().unwrap()) {
            self.bind_in_current_scope(v);
        }
    }

    fn bind_in_current_scope(&mut self, v: Variable) {
        self.scopes.last_mut().expect("scope stack never empty").defined.push(v);
    }

    /// Binds `identifier` to `variable` in the innermost scope. Used only
    /// by source→IL compilation and by `SpliceMutator` when re-targeting a
    /// spliced range's free identifiers; never by the IL's own semantics.
    pub fn declare(&mut self, identifier: impl Into<String>, variable: Variable) {
        self.scopes.last_mut().expect("scope stack never empty").bindings.insert(identifier.into(), variable);
    }

    /// Resolves `identifier` to a variable in the innermost enclosing scope
    /// that provides it.
    pub fn scope_lookup(&self, identifier: &str) -> ScopeLookup {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.bindings.get(identifier) {
                return ScopeLookup::InScope(*v);
            }
        }
        ScopeLookup::NotFound
    }

    /// All variables defined in enclosing scopes at the current position,
    /// optionally filtered by `predicate` (e.g. "outputs of a `LoadInteger`
    /// instruction", used by mutators to find type-compatible replacement
    /// inputs).
    pub fn visible_variables(&self, mut predicate: impl FnMut(Variable) -> bool) -> Vec<Variable> {
        let mut out = Vec::new();
        for scope in &self.scopes {
            for v in &scope.defined {
                if predicate(*v) {
                    out.push(*v);
                }
            }
        }
        out
    }

    /// Appends `note` to this program's cosmetic history log.
    pub fn note(&mut self, note: impl Into<String>) {
        self.history.entries.push(note.into());
    }

    /// Checks that all opened blocks have been closed and returns the
    /// finished, immutable `Program`.
    pub fn finalize(self) -> Result<Program, BuildError> {
        if !self.context_stack.is_top_level() {
            return Err(BuildError::UnbalancedBlock);
        }
        Ok(Program::from_checked_instructions(self.instructions, self.history))
    }
}

fn instr_outputs(instr: &Instruction) -> impl Iterator<Item = Variable> + '_ {
    instr.outputs.iter().copied()
}
