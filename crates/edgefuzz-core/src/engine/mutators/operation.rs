//! Mutates an operation's immediate parameters only — never arity or block
//! nesting (§4.2).

use rand::Rng;

use crate::error::MutationError;
use crate::il::{BinaryOp, CompareOp, Instruction, Opcode, Program, UnaryOp};

use super::{MutationContext, Mutator};

pub struct OperationMutator;

impl Mutator for OperationMutator {
    fn name(&self) -> &'static str {
        "OperationMutator"
    }

    fn mutate(&self, parent: &Program, ctx: &mut MutationContext) -> Result<Program, MutationError> {
        let instructions = parent.instructions();
        let candidates: Vec<usize> = instructions
            .iter()
            .enumerate()
            .filter(|(_, instr)| instr.is_mutable())
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return Err(MutationError::NoCompatibleInput);
        }
        let index = candidates[ctx.rng.gen_range(0..candidates.len())];
        let mutated_opcode = mutate_payload(&instructions[index].opcode, ctx.rng);

        let mut new_instructions: Vec<Instruction> = instructions.to_vec();
        new_instructions[index].opcode = mutated_opcode;

        let candidate = Program::from_checked_instructions(new_instructions, parent.history().clone());
        candidate.validate().map_err(MutationError::Build)?;
        Ok(candidate.with_history_note(format!("{} mutated operand of instruction {index}", self.name())))
    }
}

fn mutate_payload(opcode: &Opcode, rng: &mut rand_chacha::ChaCha8Rng) -> Opcode {
    match opcode {
        Opcode::LoadInteger(_) => Opcode::LoadInteger(rng.gen_range(-1_000_000..1_000_000)),
        Opcode::LoadFloat(_) => Opcode::LoadFloat(rng.gen_range(-1000.0f64..1000.0).to_bits()),
        Opcode::LoadBigInt(_) => Opcode::LoadBigInt(rng.gen_range(-1_000_000..1_000_000)),
        Opcode::LoadString(_) => Opcode::LoadString(format!("s{}", rng.gen_range(0..10_000))),
        Opcode::LoadRegExp { pattern, flags } => {
            let _ = pattern;
            Opcode::LoadRegExp { pattern: format!("p{}", rng.gen_range(0..1000)), flags: flags.clone() }
        }
        Opcode::LoadBoolean(b) => Opcode::LoadBoolean(!b),
        Opcode::LoadBuiltin(_) => Opcode::LoadBuiltin(format!("builtin{}", rng.gen_range(0..20))),
        Opcode::GetProperty(_) => Opcode::GetProperty(format!("p{}", rng.gen_range(0..1000))),
        Opcode::SetProperty(_) => Opcode::SetProperty(format!("p{}", rng.gen_range(0..1000))),
        Opcode::CallMethod { .. } => Opcode::CallMethod { method_name: format!("m{}", rng.gen_range(0..1000)) },
        Opcode::BinaryOperation(_) => Opcode::BinaryOperation(random_binary_op(rng)),
        Opcode::UnaryOperation(_) => Opcode::UnaryOperation(random_unary_op(rng)),
        Opcode::Compare(_) => Opcode::Compare(random_compare_op(rng)),
        Opcode::BeginWhile(_) => Opcode::BeginWhile(random_compare_op(rng)),
        Opcode::BeginDoWhile(_) => Opcode::BeginDoWhile(random_compare_op(rng)),
        Opcode::LoadFromScope(_) => Opcode::LoadFromScope(format!("v{}", rng.gen_range(0..1000))),
        other => other.clone(),
    }
}

fn random_binary_op(rng: &mut rand_chacha::ChaCha8Rng) -> BinaryOp {
    use BinaryOp::*;
    const OPS: &[BinaryOp] = &[Add, Sub, Mul, Div, Mod, Pow, BitAnd, BitOr, BitXor, LShift, RShift, LogicalAnd, LogicalOr];
    OPS[rng.gen_range(0..OPS.len())]
}

fn random_unary_op(rng: &mut rand_chacha::ChaCha8Rng) -> UnaryOp {
    use UnaryOp::*;
    const OPS: &[UnaryOp] = &[Neg, LogicalNot, BitwiseNot, PostInc, PostDec, PreInc, PreDec];
    OPS[rng.gen_range(0..OPS.len())]
}

fn random_compare_op(rng: &mut rand_chacha::ChaCha8Rng) -> CompareOp {
    use CompareOp::*;
    const OPS: &[CompareOp] =
        &[Equal, NotEqual, StrictEqual, StrictNotEqual, LessThan, LessThanOrEqual, GreaterThan, GreaterThanOrEqual];
    OPS[rng.gen_range(0..OPS.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generators::default_generators;
    use crate::il::Builder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn mutates_a_literal_without_changing_arity() {
        let mut builder = Builder::new();
        builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
        let program = builder.finalize().unwrap();

        let generators = default_generators();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut ctx = MutationContext { rng: &mut rng, generators: &generators, donor: None, instruction_budget: 10 };
        let mutated = OperationMutator.mutate(&program, &mut ctx).unwrap();
        assert_eq!(mutated.len(), program.len());
        assert!(mutated.validate().is_ok());
    }
}
