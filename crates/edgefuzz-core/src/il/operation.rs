//! The closed taxonomy of IL operations ([`Opcode`]) and their static metadata.
//!
//! Every opcode variant carries its own operation-immediate parameters
//! (literals, property names, comparator kinds, ...) directly as enum
//! fields. Arity and attribute metadata (how many inputs/outputs/inner
//! outputs an instruction built from this opcode needs, whether it opens or
//! closes a block, what context it requires) are derived by the `arity()` /
//! `attributes()` / `required_context()` methods below rather than stored
//! per instance, mirroring how `ouros`'s `Opcode::stack_effect()` derives
//! stack metadata from the opcode tag instead of caching it per instruction.

use crate::il::context::Context;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    LogicalAnd,
    LogicalOr,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Neg,
    LogicalNot,
    BitwiseNot,
    PostInc,
    PostDec,
    PreInc,
    PreDec,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Which flavor of function a `BeginFunctionDefinition`/`EndFunctionDefinition`
/// pair introduces. Models the spec's "plain/arrow/async/generator ×
/// with/without async" cross product without exploding the opcode count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, serde::Serialize, serde::Deserialize)]
pub enum FunctionKind {
    Plain,
    Arrow,
    Async,
    Generator,
    AsyncArrow,
    AsyncGenerator,
}

impl FunctionKind {
    pub fn is_async(self) -> bool {
        matches!(self, FunctionKind::Async | FunctionKind::AsyncArrow | FunctionKind::AsyncGenerator)
    }

    pub fn is_generator(self) -> bool {
        matches!(self, FunctionKind::Generator | FunctionKind::AsyncGenerator)
    }

    /// `true` for arrow variants, which never introduce a subroutine-local
    /// `arguments`/`this` binding distinct from their enclosing scope.
    pub fn is_arrow(self) -> bool {
        matches!(self, FunctionKind::Arrow | FunctionKind::AsyncArrow)
    }
}

/// Number of inputs/outputs/inner-outputs an instruction needs.
///
/// `Fixed` opcodes need exactly the given counts. `Variadic` opcodes (calls,
/// array/object literals with a dynamic argument count) need at least
/// `min_inputs`, with every input beyond that counted as an extra argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed { inputs: u32, outputs: u32, inner_outputs: u32 },
    Variadic { min_inputs: u32, outputs: u32 },
}

impl Arity {
    /// Whether `input_count` satisfies this arity.
    pub fn accepts_input_count(self, input_count: usize) -> bool {
        match self {
            Arity::Fixed { inputs, .. } => input_count == inputs as usize,
            Arity::Variadic { min_inputs, .. } => input_count >= min_inputs as usize,
        }
    }

    pub fn output_count(self) -> u32 {
        match self {
            Arity::Fixed { outputs, .. } => outputs,
            Arity::Variadic { outputs, .. } => outputs,
        }
    }

    pub fn inner_output_count(self) -> u32 {
        match self {
            Arity::Fixed { inner_outputs, .. } => inner_outputs,
            Arity::Variadic { .. } => 0,
        }
    }
}

/// Block-structure and mutation-friendliness flags for an opcode.
///
/// At least the attributes named in the data model: `opens_block`,
/// `closes_block`, `is_block_start`, `is_block_end`,
/// `propagates_surrounding_context`, `is_mutable`, `is_jump_target`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationAttributes {
    /// Opens a new block, pushing a context frame (e.g. `BeginFor`).
    pub opens_block: bool,
    /// Closes the innermost block, popping a context frame (e.g. `EndFor`).
    pub closes_block: bool,
    /// First instruction of a block (`opens_block` or an interior marker
    /// like `BeginElse` that starts a new sub-block of the same construct).
    pub is_block_start: bool,
    /// Last instruction of a block (`closes_block` or an interior marker
    /// like `BeginElse` that ends the preceding sub-block).
    pub is_block_end: bool,
    /// Block-opener whose inner context still includes everything the
    /// surrounding context provided (e.g. `BeginIf` propagates `loop` if
    /// the `if` is nested in a loop; `BeginPlainFunction` does not).
    pub propagates_surrounding_context: bool,
    /// `OperationMutator` may mutate this opcode's immediate parameters.
    pub is_mutable: bool,
    /// Valid target of a `Break`/`Continue` (loop and switch-like blocks).
    pub is_jump_target: bool,
}

/// The closed taxonomy of IL operations.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Opcode {
    // --- Loads ---
    LoadInteger(i64),
    LoadFloat(u64), // bit pattern of an f64; raw bits keep Eq/Hash total.
    LoadBigInt(i64),
    LoadString(String),
    LoadRegExp { pattern: String, flags: String },
    LoadBoolean(bool),
    LoadNull,
    LoadUndefined,
    LoadBuiltin(String),

    // --- Arithmetic / compare / unary ---
    BinaryOperation(BinaryOp),
    UnaryOperation(UnaryOp),
    Compare(CompareOp),
    TypeOf,

    // --- Objects ---
    CreateObject { property_names: Vec<String> },
    GetProperty(String),
    SetProperty(String),
    GetElement,
    SetElement,

    // --- Arrays ---
    CreateArray,
    CreateArrayWithSpread { spreads: Vec<bool> },

    // --- Functions ---
    BeginFunctionDefinition { kind: FunctionKind, parameter_count: u32 },
    EndFunctionDefinition,

    // --- Calls ---
    CallFunction,
    CallFunctionWithSpread { spreads: Vec<bool> },
    CallMethod { method_name: String },

    // --- Control blocks ---
    BeginIf,
    BeginElse,
    EndIf,
    BeginWhile(CompareOp),
    EndWhile,
    BeginDoWhile(CompareOp),
    EndDoWhile,
    BeginFor,
    EndFor,
    BeginForIn,
    EndForIn,
    BeginForOf,
    EndForOf,
    BeginTry,
    BeginCatch,
    EndTryCatch,
    BeginWith,
    EndWith,

    // --- Non-local control flow ---
    Throw,
    Break,
    Continue,
    Return,
    Yield,
    YieldEach,
    Await,

    // --- Misc ---
    Reassign,
    Dup,
    LoadFromScope(String),
}

impl Opcode {
    /// Static arity metadata for instructions built from this opcode.
    pub fn arity(&self) -> Arity {
        use Opcode::*;
        match self {
            LoadInteger(_) | LoadFloat(_) | LoadBigInt(_) | LoadString(_) | LoadRegExp { .. } | LoadBoolean(_)
            | LoadNull | LoadUndefined | LoadBuiltin(_) => Arity::Fixed { inputs: 0, outputs: 1, inner_outputs: 0 },

            BinaryOperation(_) | Compare(_) => Arity::Fixed { inputs: 2, outputs: 1, inner_outputs: 0 },
            UnaryOperation(_) | TypeOf => Arity::Fixed { inputs: 1, outputs: 1, inner_outputs: 0 },

            CreateObject { property_names } => {
                Arity::Fixed { inputs: property_names.len() as u32, outputs: 1, inner_outputs: 0 }
            }
            GetProperty(_) => Arity::Fixed { inputs: 1, outputs: 1, inner_outputs: 0 },
            SetProperty(_) => Arity::Fixed { inputs: 2, outputs: 0, inner_outputs: 0 },
            GetElement => Arity::Fixed { inputs: 2, outputs: 1, inner_outputs: 0 },
            SetElement => Arity::Fixed { inputs: 3, outputs: 0, inner_outputs: 0 },

            CreateArray => Arity::Variadic { min_inputs: 0, outputs: 1 },
            CreateArrayWithSpread { .. } => Arity::Variadic { min_inputs: 0, outputs: 1 },

            BeginFunctionDefinition { parameter_count, kind } => {
                // Inner outputs: one per parameter, plus an implicit `this`
                // binding for non-arrow functions.
                let inner = parameter_count + u32::from(!kind.is_arrow());
                Arity::Fixed { inputs: 0, outputs: 1, inner_outputs: inner }
            }
            EndFunctionDefinition => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },

            CallFunction => Arity::Variadic { min_inputs: 1, outputs: 1 },
            CallFunctionWithSpread { .. } => Arity::Variadic { min_inputs: 1, outputs: 1 },
            CallMethod { .. } => Arity::Variadic { min_inputs: 1, outputs: 1 },

            BeginIf => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 0 },
            BeginElse => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            EndIf => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },

            BeginWhile(_) => Arity::Fixed { inputs: 2, outputs: 0, inner_outputs: 0 },
            EndWhile => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            BeginDoWhile(_) => Arity::Fixed { inputs: 2, outputs: 0, inner_outputs: 0 },
            EndDoWhile => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },

            BeginFor => Arity::Fixed { inputs: 3, outputs: 0, inner_outputs: 1 },
            EndFor => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            BeginForIn => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 1 },
            EndForIn => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            BeginForOf => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 1 },
            EndForOf => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },

            BeginTry => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            BeginCatch => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 1 },
            EndTryCatch => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            BeginWith => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 0 },
            EndWith => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },

            Throw => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 0 },
            Break | Continue => Arity::Fixed { inputs: 0, outputs: 0, inner_outputs: 0 },
            Return => Arity::Variadic { min_inputs: 0, outputs: 0 },
            Yield => Arity::Fixed { inputs: 1, outputs: 1, inner_outputs: 0 },
            YieldEach => Arity::Fixed { inputs: 1, outputs: 0, inner_outputs: 0 },
            Await => Arity::Fixed { inputs: 1, outputs: 1, inner_outputs: 0 },

            Reassign => Arity::Fixed { inputs: 2, outputs: 0, inner_outputs: 0 },
            Dup => Arity::Fixed { inputs: 1, outputs: 1, inner_outputs: 0 },
            LoadFromScope(_) => Arity::Fixed { inputs: 0, outputs: 1, inner_outputs: 0 },
        }
    }

    /// Block-structure and mutation flags.
    pub fn attributes(&self) -> OperationAttributes {
        use Opcode::*;
        // `BeginCatch` and `BeginElse` are interior markers, not independent
        // block delimiters: they continue inside the frame their `BeginTry`/
        // `BeginIf` already pushed (see `Builder::begin_interior`), so they
        // are deliberately absent from both `opens` and `closes`.
        let opens = matches!(
            self,
            BeginFunctionDefinition { .. }
                | BeginIf
                | BeginWhile(_)
                | BeginDoWhile(_)
                | BeginFor
                | BeginForIn
                | BeginForOf
                | BeginTry
                | BeginWith
        );
        let closes = matches!(
            self,
            EndFunctionDefinition
                | EndIf
                | EndWhile
                | EndDoWhile
                | EndFor
                | EndForIn
                | EndForOf
                | EndTryCatch
                | EndWith
        );
        let is_else = matches!(self, BeginElse);
        let is_catch = matches!(self, BeginCatch);
        let propagates = matches!(
            self,
            BeginIf | BeginWhile(_) | BeginDoWhile(_) | BeginFor | BeginForIn | BeginForOf | BeginTry | BeginWith
        );
        let mutable = matches!(
            self,
            LoadInteger(_)
                | LoadFloat(_)
                | LoadBigInt(_)
                | LoadString(_)
                | LoadRegExp { .. }
                | LoadBoolean(_)
                | LoadBuiltin(_)
                | GetProperty(_)
                | SetProperty(_)
                | CallMethod { .. }
                | BinaryOperation(_)
                | UnaryOperation(_)
                | Compare(_)
                | BeginWhile(_)
                | BeginDoWhile(_)
                | LoadFromScope(_)
        );
        let jump_target = matches!(self, BeginFor | BeginForIn | BeginForOf | BeginWhile(_) | BeginDoWhile(_));
        OperationAttributes {
            opens_block: opens,
            closes_block: closes,
            is_block_start: opens || is_else || is_catch,
            is_block_end: closes || is_else || is_catch,
            propagates_surrounding_context: propagates,
            is_mutable: mutable,
            is_jump_target: jump_target,
        }
    }

    /// Context this opcode requires to be legal at its position (invariant 4).
    pub fn required_context(&self) -> Context {
        use Opcode::*;
        match self {
            Break | Continue => Context::LOOP,
            Return => Context::SUBROUTINE,
            Yield | YieldEach => Context::GENERATOR,
            Await => Context::ASYNC,
            _ => Context::JAVASCRIPT,
        }
    }

    /// Context newly made available *inside* the block this opcode opens,
    /// on top of whatever `propagates_surrounding_context` carries forward.
    /// Meaningful when `attributes().opens_block` is true, and also for an
    /// interior marker like `BeginCatch`, which folds this into the still-open
    /// frame its `BeginTry` pushed rather than starting a new one.
    pub fn introduced_context(&self) -> Context {
        use Opcode::*;
        match self {
            BeginFunctionDefinition { kind, .. } => {
                let mut ctx = Context::SUBROUTINE;
                if kind.is_async() {
                    ctx |= Context::ASYNC;
                }
                if kind.is_generator() {
                    ctx |= Context::GENERATOR;
                }
                ctx
            }
            BeginFor | BeginForIn | BeginForOf | BeginWhile(_) | BeginDoWhile(_) => Context::LOOP,
            BeginCatch => Context::CATCH,
            BeginWith => Context::WITH,
            _ => Context::EMPTY,
        }
    }
}
