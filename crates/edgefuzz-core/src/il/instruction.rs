//! `Instruction`: an `Opcode` paired with its concrete input/output variables.

use crate::il::context::Context;
use crate::il::operation::Opcode;
use crate::il::variable::Variable;

/// A single step of a [`Program`](super::program::Program): an opcode,
/// the variables it reads, and the fresh variables it defines.
///
/// Output variables are always freshly numbered and monotonically
/// increasing with position (invariant 5); `Instruction` itself does not
/// enforce that — [`super::builder::Builder`] does, at construction time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    /// Freshly allocated variables visible only inside the block this
    /// instruction opens (e.g. a `for` loop's induction variable, a
    /// function's parameters). Empty for non-block-opening instructions.
    pub inner_outputs: Vec<Variable>,
}

impl Instruction {
    pub fn new(opcode: Opcode, inputs: Vec<Variable>, outputs: Vec<Variable>, inner_outputs: Vec<Variable>) -> Self {
        Self { opcode, inputs, outputs, inner_outputs }
    }

    /// Context this instruction requires at its position.
    pub fn required_context(&self) -> Context {
        self.opcode.required_context()
    }

    /// All variables defined by this instruction, outer and inner combined.
    pub fn all_outputs(&self) -> impl Iterator<Item = Variable> + '_ {
        self.outputs.iter().copied().chain(self.inner_outputs.iter().copied())
    }

    pub fn opens_block(&self) -> bool {
        self.opcode.attributes().opens_block
    }

    pub fn closes_block(&self) -> bool {
        self.opcode.attributes().closes_block
    }

    pub fn is_block_start(&self) -> bool {
        self.opcode.attributes().is_block_start
    }

    pub fn is_block_end(&self) -> bool {
        self.opcode.attributes().is_block_end
    }

    pub fn is_mutable(&self) -> bool {
        self.opcode.attributes().is_mutable
    }

    pub fn is_jump_target(&self) -> bool {
        self.opcode.attributes().is_jump_target
    }
}
