//! Code generators: named units that append a bounded, self-contained
//! sequence of instructions to a `Builder` (§4.2).
//!
//! Each generator declares the context it requires and the input types it
//! wants; the engine is responsible for filtering by context and for
//! finding visible variables that satisfy the input types before invoking
//! `build`. A generator that opens a block always closes it itself — the
//! engine never leaves a block open across generator calls — so a single
//! `build` invocation is always a structurally complete, independently
//! valid unit.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::BuildError;
use crate::il::{Builder, CompareOp, Context, FunctionKind, Opcode, Variable};

use super::value_type::ValueType;

type GeneratorFn = Box<dyn Fn(&mut Builder, &[Variable], &mut ChaCha8Rng) -> Result<(), BuildError>>;

/// A named, invocable unit of code generation.
pub struct CodeGenerator {
    pub name: &'static str,
    pub required_context: Context,
    /// Value types this generator wants as inputs, in order.
    pub input_types: Vec<ValueType>,
    /// If this generator opens a block, the context available inside it —
    /// used by [`super::context_graph::ContextGraph`] to find a path to a
    /// target context. `None` for generators that never open a block.
    pub opens_context: Option<Context>,
    build: GeneratorFn,
}

impl CodeGenerator {
    pub fn invoke(&self, builder: &mut Builder, inputs: &[Variable], rng: &mut ChaCha8Rng) -> Result<(), BuildError> {
        (self.build)(builder, inputs, rng)
    }
}

fn random_identifier(rng: &mut ChaCha8Rng, prefix: &str) -> String {
    format!("{prefix}{}", rng.gen_range(0..1000))
}

/// The fixed catalog of generators the engine draws from. Grounded on
/// `ouros::bytecode::builder::CodeBuilder`'s emit-helper style (one small
/// function per shape of thing to build), generalized from emitting
/// bytecode to emitting IL instructions.
pub fn default_generators() -> Vec<CodeGenerator> {
    vec![
        CodeGenerator {
            name: "LoadIntegerGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, _inputs, rng| {
                let value: i64 = rng.gen_range(-1000..1000);
                builder.emit(Opcode::LoadInteger(value), vec![]).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "LoadStringGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, _inputs, rng| {
                let s = random_identifier(rng, "s");
                builder.emit(Opcode::LoadString(s), vec![]).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "LoadBooleanGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, _inputs, rng| {
                builder.emit(Opcode::LoadBoolean(rng.gen_bool(0.5)), vec![]).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "BinaryOperationGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Any, ValueType::Any],
            opens_context: None,
            build: Box::new(|builder, inputs, rng| {
                use crate::il::BinaryOp::*;
                const OPS: &[crate::il::BinaryOp] = &[Add, Sub, Mul, Div, Mod, BitAnd, BitOr, LogicalAnd, LogicalOr];
                let op = OPS[rng.gen_range(0..OPS.len())];
                builder.emit(Opcode::BinaryOperation(op), inputs.to_vec()).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "CompareGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Any, ValueType::Any],
            opens_context: None,
            build: Box::new(|builder, inputs, _rng| builder.emit(Opcode::Compare(CompareOp::Equal), inputs.to_vec()).map(|_| ())),
        },
        CodeGenerator {
            name: "CreateArrayGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, inputs, _rng| builder.emit(Opcode::CreateArray, inputs.to_vec()).map(|_| ())),
        },
        CodeGenerator {
            name: "CreateObjectGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, inputs, rng| {
                let property_names: Vec<String> = inputs.iter().map(|_| random_identifier(rng, "p")).collect();
                builder.emit(Opcode::CreateObject { property_names }, inputs.to_vec()).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "GetPropertyGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Object],
            opens_context: None,
            build: Box::new(|builder, inputs, rng| {
                let name = random_identifier(rng, "p");
                builder.emit(Opcode::GetProperty(name), inputs.to_vec()).map(|_| ())
            }),
        },
        CodeGenerator {
            name: "CallFunctionGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Function],
            opens_context: None,
            build: Box::new(|builder, inputs, _rng| builder.emit(Opcode::CallFunction, inputs.to_vec()).map(|_| ())),
        },
        CodeGenerator {
            name: "IfGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Boolean],
            opens_context: Some(Context::EMPTY),
            build: Box::new(|builder, inputs, _rng| {
                builder.open_block(Opcode::BeginIf, inputs.to_vec())?;
                builder.close_block(Opcode::EndIf, vec![])
            }),
        },
        CodeGenerator {
            name: "IfElseGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Boolean],
            opens_context: Some(Context::EMPTY),
            build: Box::new(|builder, inputs, _rng| {
                builder.open_block(Opcode::BeginIf, inputs.to_vec())?;
                builder.begin_interior(Opcode::BeginElse, vec![])?;
                builder.close_block(Opcode::EndIf, vec![])
            }),
        },
        CodeGenerator {
            name: "WhileGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Any, ValueType::Any],
            opens_context: Some(Context::LOOP),
            build: Box::new(|builder, inputs, _rng| {
                builder.open_block(Opcode::BeginWhile(CompareOp::LessThan), inputs.to_vec())?;
                builder.close_block(Opcode::EndWhile, vec![])
            }),
        },
        CodeGenerator {
            name: "ForGenerator",
            required_context: Context::EMPTY,
            input_types: vec![ValueType::Integer, ValueType::Integer, ValueType::Integer],
            opens_context: Some(Context::LOOP),
            build: Box::new(|builder, inputs, _rng| {
                builder.open_block(Opcode::BeginFor, inputs.to_vec())?;
                builder.close_block(Opcode::EndFor, vec![])
            }),
        },
        CodeGenerator {
            name: "TryCatchGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: Some(Context::CATCH),
            build: Box::new(|builder, _inputs, _rng| {
                builder.open_block(Opcode::BeginTry, vec![])?;
                builder.begin_interior(Opcode::BeginCatch, vec![])?;
                builder.close_block(Opcode::EndTryCatch, vec![])
            }),
        },
        CodeGenerator {
            name: "PlainFunctionDefinitionGenerator",
            required_context: Context::EMPTY,
            input_types: vec![],
            opens_context: Some(Context::SUBROUTINE),
            build: Box::new(|builder, _inputs, rng| {
                let parameter_count = rng.gen_range(0..3);
                builder.open_block(Opcode::BeginFunctionDefinition { kind: FunctionKind::Plain, parameter_count }, vec![])?;
                builder.close_block(Opcode::EndFunctionDefinition, vec![])
            }),
        },
        CodeGenerator {
            name: "ReturnGenerator",
            required_context: Context::SUBROUTINE,
            input_types: vec![],
            opens_context: None,
            build: Box::new(|builder, inputs, _rng| builder.emit(Opcode::Return, inputs.to_vec()).map(|_| ())),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_generator_is_invocable_with_no_inputs_or_builds_fine_with_placeholders() {
        let generators = default_generators();
        assert!(generators.iter().any(|g| g.name == "LoadIntegerGenerator"));
        assert!(generators.iter().any(|g| g.opens_context.is_some()));
    }

    #[test]
    fn load_integer_generator_appends_exactly_one_instruction() {
        use rand::SeedableRng;
        let mut builder = Builder::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let generators = default_generators();
        let gen = generators.iter().find(|g| g.name == "LoadIntegerGenerator").unwrap();
        gen.invoke(&mut builder, &[], &mut rng).unwrap();
        assert_eq!(builder.instruction_count(), 1);
    }

    #[test]
    fn try_catch_generator_emits_one_balanced_block_with_a_live_catch() {
        use rand::SeedableRng;
        let mut builder = Builder::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let generators = default_generators();
        let gen = generators.iter().find(|g| g.name == "TryCatchGenerator").unwrap();
        gen.invoke(&mut builder, &[], &mut rng).unwrap();
        let program = builder.finalize().unwrap();

        assert_eq!(program.len(), 3, "BeginTry, BeginCatch, EndTryCatch");
        assert!(program.validate().is_ok());
        assert!(matches!(program.instructions()[1].opcode, crate::il::Opcode::BeginCatch));
    }

    #[test]
    fn if_else_generator_emits_one_balanced_block() {
        use rand::SeedableRng;
        let mut builder = Builder::new();
        let cond = builder.emit(crate::il::Opcode::LoadBoolean(true), vec![]).unwrap()[0];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let generators = default_generators();
        let gen = generators.iter().find(|g| g.name == "IfElseGenerator").unwrap();
        gen.invoke(&mut builder, &[cond], &mut rng).unwrap();
        let program = builder.finalize().unwrap();

        assert_eq!(program.len(), 4, "LoadBoolean, BeginIf, BeginElse, EndIf");
        assert!(program.validate().is_ok());
    }
}
