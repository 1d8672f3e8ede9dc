//! Replaces one input variable of a randomly chosen instruction with
//! another visible, type-compatible variable (§4.2).

use rand::Rng;

use crate::error::MutationError;
use crate::il::{Instruction, Program, Variable};

use super::super::value_type::{infer_variable_types, type_of};
use super::{MutationContext, Mutator};

pub struct InputMutator;

impl Mutator for InputMutator {
    fn name(&self) -> &'static str {
        "InputMutator"
    }

    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError> {
        let instructions = parent.instructions();
        let candidates: Vec<usize> = instructions
            .iter()
            .enumerate()
            .filter(|(_, instr)| !instr.inputs.is_empty())
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return Err(MutationError::NoCompatibleInput);
        }
        let target_index = candidates[ctx.rng.gen_range(0..candidates.len())];
        let target = &instructions[target_index];
        let slot = ctx.rng.gen_range(0..target.inputs.len());
        let wanted = infer_variable_types(&instructions[..target_index + 1]);
        let want_type = type_of(&wanted, target.inputs[slot]);

        let visible: Vec<Variable> = (0..target_index)
            .flat_map(|i| instructions[i].all_outputs())
            .chain(instructions[target_index].inner_outputs.clone())
            .filter(|v| *v != target.inputs[slot])
            .filter(|v| type_of(&wanted, *v).is_compatible_with(want_type))
            .collect();
        if visible.is_empty() {
            return Err(MutationError::NoCompatibleInput);
        }
        let replacement = visible[ctx.rng.gen_range(0..visible.len())];

        let mut new_instructions: Vec<Instruction> = instructions.to_vec();
        new_instructions[target_index].inputs[slot] = replacement;

        let candidate = Program::from_checked_instructions(new_instructions, parent.history().clone());
        candidate.validate().map_err(MutationError::Build)?;
        Ok(candidate.with_history_note(format!("{} replaced input {slot} of instruction {target_index}", self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generators::default_generators;
    use crate::il::Builder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn replaces_an_input_with_a_different_visible_variable() {
        let mut builder = Builder::new();
        let a = builder.emit(crate::il::Opcode::LoadInteger(1), vec![]).unwrap()[0];
        let b = builder.emit(crate::il::Opcode::LoadInteger(2), vec![]).unwrap()[0];
        builder.emit(crate::il::Opcode::Reassign, vec![a, b]).unwrap();
        let program = builder.finalize().unwrap();

        let generators = default_generators();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: None, instruction_budget: 10 };
        let mutated = InputMutator.mutate(&program, &mut ctx).unwrap();
        assert!(mutated.validate().is_ok());
    }
}
