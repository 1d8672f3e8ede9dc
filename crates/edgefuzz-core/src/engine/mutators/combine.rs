//! Appends an entire donor program after a random top-level position in the
//! target, shifting every donor variable reference by the target's variable
//! count at that point (§4.2).
//!
//! Unlike `SpliceMutator`, which grafts an arbitrary (possibly inner) range
//! and must hunt for compatible replacement variables, `CombineMutator`
//! only ever inserts at depth-1 boundaries and never rewires a donor input
//! to a target variable — the donor program is already closed (every input
//! it reads, it also defines), so a uniform shift is always sound.

use rand::Rng;

use crate::error::MutationError;
use crate::il::Program;

use super::super::rewrite::{replay_prefix, replay_shifted, top_level_insertion_points};
use super::{MutationContext, Mutator};

pub struct CombineMutator;

impl Mutator for CombineMutator {
    fn name(&self) -> &'static str {
        "CombineMutator"
    }

    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError> {
        let donor = ctx.donor.ok_or(MutationError::NoDonorAvailable)?;
        if donor.is_empty() {
            return Err(MutationError::NoDonorAvailable);
        }

        let instructions = parent.instructions();
        let points = top_level_insertion_points(instructions);
        let insertion_index = points[ctx.rng.gen_range(0..points.len())];

        let mut builder = replay_prefix(instructions, insertion_index).map_err(MutationError::Build)?;
        let shift_threshold = 0;
        let delta = builder.next_variable_count();
        replay_shifted(&mut builder, donor.instructions(), shift_threshold, delta).map_err(MutationError::Build)?;

        let suffix_threshold = parent_variable_count_at(instructions, insertion_index);
        let suffix_delta = builder.next_variable_count() - suffix_threshold;
        replay_shifted(&mut builder, &instructions[insertion_index..], suffix_threshold, suffix_delta)
            .map_err(MutationError::Build)?;

        let candidate = builder.finalize().map_err(MutationError::Build)?;
        Ok(candidate.with_history_note(format!(
            "{} combined a {}-instruction donor program at position {insertion_index}",
            self.name(),
            donor.len()
        )))
    }
}

fn parent_variable_count_at(instructions: &[crate::il::Instruction], upto: usize) -> u32 {
    instructions[..upto].iter().map(|i| (i.outputs.len() + i.inner_outputs.len()) as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generators::default_generators;
    use crate::il::{Builder, Opcode};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn simple_program() -> Program {
        let mut builder = Builder::new();
        builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
        builder.emit(Opcode::LoadInteger(2), vec![]).unwrap();
        builder.finalize().unwrap()
    }

    #[test]
    fn combining_without_a_donor_fails_cleanly() {
        let program = simple_program();
        let generators = default_generators();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: None, instruction_budget: 10 };
        assert!(matches!(CombineMutator.mutate(&program, &mut ctx), Err(MutationError::NoDonorAvailable)));
    }

    #[test]
    fn combining_two_programs_yields_their_combined_length() {
        let program = simple_program();
        let donor = simple_program();
        let generators = default_generators();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: Some(&donor), instruction_budget: 10 };
        let combined = CombineMutator.mutate(&program, &mut ctx).unwrap();
        assert_eq!(combined.len(), program.len() + donor.len());
        assert!(combined.validate().is_ok());
    }
}
