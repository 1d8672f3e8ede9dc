//! A coarse, best-effort value classification used only to pick
//! "compatible" replacement inputs for mutators and generator input slots
//! (§4.2: "of a compatible type"). The IL itself carries no type
//! information on variables; this is inferred structurally from the
//! opcode that produced a variable, the same way `ouros`'s bytecode
//! builder infers stack-slot shape from the emitting opcode rather than
//! tracking a separate type per slot.

use std::collections::HashMap;

use crate::il::{Instruction, Opcode, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    BigInt,
    String,
    Boolean,
    Object,
    Array,
    Function,
    /// Anything not confidently classified; compatible with any predicate
    /// that accepts `Any`, never offered as a compatible replacement for a
    /// narrower requested type.
    Any,
}

impl ValueType {
    /// Whether a variable of `self` may stand in for a slot that wants `want`.
    pub fn is_compatible_with(self, want: ValueType) -> bool {
        want == ValueType::Any || self == want
    }
}

/// Infers the [`ValueType`] of the (first) output an instruction built from
/// `opcode` produces, where determinable.
pub fn infer_output_type(opcode: &Opcode) -> ValueType {
    use Opcode::*;
    match opcode {
        LoadInteger(_) => ValueType::Integer,
        LoadFloat(_) => ValueType::Float,
        LoadBigInt(_) => ValueType::BigInt,
        LoadString(_) | LoadRegExp { .. } => ValueType::String,
        LoadBoolean(_) => ValueType::Boolean,
        LoadNull | LoadUndefined => ValueType::Any,
        LoadBuiltin(_) => ValueType::Function,
        CreateObject { .. } => ValueType::Object,
        CreateArray | CreateArrayWithSpread { .. } => ValueType::Array,
        BeginFunctionDefinition { .. } => ValueType::Function,
        Compare(_) => ValueType::Boolean,
        BinaryOperation(_) | UnaryOperation(_) => ValueType::Any,
        TypeOf => ValueType::String,
        GetProperty(_) | GetElement | CallFunction | CallFunctionWithSpread { .. } | CallMethod { .. } | Dup
        | Yield | Await | LoadFromScope(_) => ValueType::Any,
        _ => ValueType::Any,
    }
}

/// Infers a [`ValueType`] for every variable defined across `instructions`,
/// by walking them in order and tagging each output/inner-output with the
/// defining instruction's inferred type. Inner outputs (loop induction
/// variables, function parameters, caught exceptions) are conservatively
/// `Any`, since their shape depends on the call site, not the opcode.
pub fn infer_variable_types(instructions: &[Instruction]) -> HashMap<u32, ValueType> {
    let mut types = HashMap::new();
    for instr in instructions {
        let output_type = infer_output_type(&instr.opcode);
        for v in &instr.outputs {
            types.insert(v.raw(), output_type);
        }
        for v in &instr.inner_outputs {
            types.insert(v.raw(), ValueType::Any);
        }
    }
    types
}

/// Looks up a variable's inferred type, defaulting to `Any` when unknown.
pub fn type_of(types: &HashMap<u32, ValueType>, v: Variable) -> ValueType {
    types.get(&v.raw()).copied().unwrap_or(ValueType::Any)
}

