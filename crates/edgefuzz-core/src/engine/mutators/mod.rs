//! The five mutators (§4.2), each a small, independently testable unit
//! implementing the shared [`Mutator`] trait.

pub mod codegen;
pub mod combine;
pub mod input;
pub mod operation;
pub mod splice;

use rand_chacha::ChaCha8Rng;

use crate::error::MutationError;
use crate::il::Program;

use super::generators::CodeGenerator;

/// Everything a mutator needs beyond the parent program it mutates: the
/// shared RNG, the generator catalog (for `CodeGenMutator`), and an
/// optional donor program (for `SpliceMutator`/`CombineMutator`).
pub struct MutationContext<'a> {
    pub rng: &'a mut ChaCha8Rng,
    pub generators: &'a [CodeGenerator],
    pub donor: Option<&'a Program>,
    /// Remaining instruction budget `CodeGenMutator` should respect when
    /// inserting new instructions.
    pub instruction_budget: u32,
}

/// Produces a candidate `Program` from a parent, applying one mutation.
///
/// Implementations must never return a `Program` that fails `validate()`:
/// on any invariant violation they propagate the
/// [`crate::error::BuildError`] via [`MutationError::Build`] instead.
/// `FuzzEngine` discards the candidate and records a failure against the
/// mutator when this returns `Err`.
pub trait Mutator {
    fn name(&self) -> &'static str;
    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError>;
}

pub fn default_mutators() -> Vec<Box<dyn Mutator>> {
    vec![
        Box::new(input::InputMutator),
        Box::new(operation::OperationMutator),
        Box::new(codegen::CodeGenMutator),
        Box::new(splice::SpliceMutator),
        Box::new(combine::CombineMutator),
    ]
}
