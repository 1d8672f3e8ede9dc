//! Inserts a sequence of newly generated instructions at a random position
//! whose current context permits them (§4.2).

use rand::Rng;

use crate::error::MutationError;
use crate::il::Program;

use super::super::rewrite::replay_prefix;
use super::super::value_type::{infer_variable_types, type_of};
use super::{MutationContext, Mutator};

pub struct CodeGenMutator;

impl Mutator for CodeGenMutator {
    fn name(&self) -> &'static str {
        "CodeGenMutator"
    }

    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError> {
        let instructions = parent.instructions();
        let insertion_index = ctx.rng.gen_range(0..=instructions.len());

        let mut builder = replay_prefix(instructions, insertion_index).map_err(MutationError::Build)?;
        let current_context = builder.current_context();

        let fitting: Vec<&crate::engine::generators::CodeGenerator> =
            ctx.generators.iter().filter(|g| current_context.contains(g.required_context)).collect();
        if fitting.is_empty() {
            return Err(MutationError::NoGeneratorFits);
        }
        let generator = fitting[ctx.rng.gen_range(0..fitting.len())];

        let types = infer_variable_types(&instructions[..insertion_index]);
        let mut inputs = Vec::with_capacity(generator.input_types.len());
        for &want in &generator.input_types {
            let visible: Vec<_> = (0..insertion_index)
                .flat_map(|i| instructions[i].all_outputs())
                .filter(|v| type_of(&types, *v).is_compatible_with(want))
                .collect();
            if visible.is_empty() {
                return Err(MutationError::NoCompatibleInput);
            }
            inputs.push(visible[ctx.rng.gen_range(0..visible.len())]);
        }

        generator.invoke(&mut builder, &inputs, ctx.rng).map_err(MutationError::Build)?;
        let inserted_count = builder.instruction_count() - insertion_index;
        let delta = builder.next_variable_count() - parent_variable_count_at(instructions, insertion_index);

        super::super::rewrite::replay_shifted(
            &mut builder,
            &instructions[insertion_index..],
            parent_variable_count_at(instructions, insertion_index),
            delta,
        )
        .map_err(MutationError::Build)?;

        let candidate = builder.finalize().map_err(MutationError::Build)?;
        let candidate = candidate.with_history_note(format!(
            "{} inserted {inserted_count} instruction(s) from {} at position {insertion_index}",
            self.name(),
            generator.name
        ));
        Ok(candidate)
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

    #[test]
    fn inserts_at_least_one_instruction_and_stays_valid() {
        let mut builder = Builder::new();
        builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
        builder.emit(Opcode::LoadInteger(2), vec![]).unwrap();
        let program = builder.finalize().unwrap();

        let generators = default_generators();
        let mut succeeded = false;
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: None, instruction_budget: 10 };
            if let Ok(candidate) = CodeGenMutator.mutate(&program, &mut ctx) {
                assert!(candidate.len() >= program.len());
                assert!(candidate.validate().is_ok());
                succeeded = true;
                break;
            }
        }
        assert!(succeeded, "expected at least one of 50 seeds to succeed");
    }
}
