//! Selects a contiguous instruction range from a donor program, renumbers
//! it for the target, and inserts it (§4.2).
//!
//! Rejects the splice if the donor range opens/closes blocks unevenly, or
//! if the target insertion site cannot provide compatible replacements for
//! the range's external (free) variable references.

use rand::Rng;

use crate::error::MutationError;
use crate::il::Program;

use super::super::rewrite::{context_before, is_block_balanced, replay_prefix};
use super::super::value_type::{infer_variable_types, type_of, ValueType};
use super::{MutationContext, Mutator};

pub struct SpliceMutator;

impl Mutator for SpliceMutator {
    fn name(&self) -> &'static str {
        "SpliceMutator"
    }

    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError> {
        let donor = ctx.donor.ok_or(MutationError::NoDonorAvailable)?;
        let donor_instructions = donor.instructions();
        if donor_instructions.is_empty() {
            return Err(MutationError::NoDonorAvailable);
        }

        let start = ctx.rng.gen_range(0..donor_instructions.len());
        let end = ctx.rng.gen_range(start + 1..=donor_instructions.len());
        let range = &donor_instructions[start..end];
        if !is_block_balanced(range) {
            return Err(MutationError::NoCompatibleInput);
        }

        let instructions = parent.instructions();
        let insertion_index = ctx.rng.gen_range(0..=instructions.len());
        let target_contexts = context_before(instructions);
        let site_context = target_contexts[insertion_index];

        for instr in range {
            if !site_context.contains(instr.required_context()) {
                return Err(MutationError::NoCompatibleInput);
            }
        }

        let defined_within: std::collections::HashSet<u32> =
            range.iter().flat_map(|i| i.all_outputs()).map(|v| v.raw()).collect();
        let donor_types = infer_variable_types(donor_instructions);
        let free_vars: Vec<u32> = range
            .iter()
            .flat_map(|i| i.inputs.iter().copied())
            .map(|v| v.raw())
            .filter(|raw| !defined_within.contains(raw))
            .collect();

        let target_types = infer_variable_types(&instructions[..insertion_index]);
        let visible_targets: Vec<crate::il::Variable> = (0..insertion_index).flat_map(|i| instructions[i].all_outputs()).collect();

        let mut mapping = std::collections::HashMap::new();
        for raw in free_vars {
            if mapping.contains_key(&raw) {
                continue;
            }
            let want = donor_types.get(&raw).copied().unwrap_or(ValueType::Any);
            let compatible: Vec<_> =
                visible_targets.iter().copied().filter(|v| type_of(&target_types, *v).is_compatible_with(want)).collect();
            if compatible.is_empty() {
                return Err(MutationError::NoCompatibleInput);
            }
            mapping.insert(raw, compatible[ctx.rng.gen_range(0..compatible.len())]);
        }

        let mut builder = replay_prefix(instructions, insertion_index).map_err(MutationError::Build)?;
        let mut var_map = mapping;
        for instr in range {
            let remapped_inputs: Vec<crate::il::Variable> = instr
                .inputs
                .iter()
                .map(|v| var_map.get(&v.raw()).copied().unwrap_or(*v))
                .collect();
            if instr.opens_block() {
                builder.open_block(instr.opcode.clone(), remapped_inputs).map_err(MutationError::Build)?;
            } else if instr.closes_block() {
                builder.close_block(instr.opcode.clone(), remapped_inputs).map_err(MutationError::Build)?;
            } else if instr.is_block_start() || instr.is_block_end() {
                builder.begin_interior(instr.opcode.clone(), remapped_inputs).map_err(MutationError::Build)?;
            } else {
                builder.emit(instr.opcode.clone(), remapped_inputs).map_err(MutationError::Build)?;
            }
            let appended = builder.instructions().last().expect("just appended");
            for (old, new) in instr.outputs.iter().zip(appended.outputs.iter()) {
                var_map.insert(old.raw(), *new);
            }
            for (old, new) in instr.inner_outputs.iter().zip(appended.inner_outputs.iter()) {
                var_map.insert(old.raw(), *new);
            }
        }

        let inserted = builder.instruction_count() - insertion_index;
        super::super::rewrite::replay_shifted(
            &mut builder,
            &instructions[insertion_index..],
            parent_variable_count_at(instructions, insertion_index),
            builder.next_variable_count() - parent_variable_count_at(instructions, insertion_index),
        )
        .map_err(MutationError::Build)?;

        let candidate = builder.finalize().map_err(MutationError::Build)?;
        Ok(candidate.with_history_note(format!("{} spliced {inserted} instruction(s) at position {insertion_index}", self.name())))
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
    fn splicing_without_a_donor_fails_cleanly() {
        let program = simple_program();
        let generators = default_generators();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: None, instruction_budget: 10 };
        assert!(matches!(SpliceMutator.mutate(&program, &mut ctx), Err(MutationError::NoDonorAvailable)));
    }

    #[test]
    fn splicing_a_self_contained_range_produces_a_valid_program() {
        let program = simple_program();
        let donor = simple_program();
        let generators = default_generators();
        let mut succeeded = false;
        for seed in 0..30 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut ctx =
                MutationContext { rng: &mut rng, generators: &generators, donor: Some(&donor), instruction_budget: 10 };
            if let Ok(candidate) = SpliceMutator.mutate(&program, &mut ctx) {
                assert!(candidate.validate().is_ok());
                succeeded = true;
                break;
            }
        }
        assert!(succeeded);
    }
}
