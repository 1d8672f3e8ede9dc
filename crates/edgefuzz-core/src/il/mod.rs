//! The mutation-friendly intermediate language: opcodes, instructions,
//! programs, and the builder that assembles them under invariant.

pub mod builder;
pub mod context;
pub mod instruction;
pub mod operation;
pub mod program;
pub mod variable;

pub use builder::{Builder, ScopeLookup};
pub use context::Context;
pub use instruction::Instruction;
pub use operation::{Arity, BinaryOp, CompareOp, FunctionKind, Opcode, OperationAttributes, UnaryOp};
pub use program::{History, Program};
pub use variable::{Variable, MAX_VARIABLES};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_is_valid_and_a_no_op() {
        let program = Builder::new().finalize().unwrap();
        assert!(program.is_empty());
        assert!(program.validate().is_ok());
    }

    #[test]
    fn definition_before_use_is_enforced() {
        let mut builder = Builder::new();
        let bogus = Variable::new(7);
        let err = builder.emit(Opcode::Reassign, vec![bogus, bogus]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::UseBeforeDef { .. }));
    }

    #[test]
    fn variable_numbering_is_dense_and_monotonic() {
        let mut builder = Builder::new();
        let a = builder.emit(Opcode::LoadInteger(1), vec![]).unwrap()[0];
        let b = builder.emit(Opcode::LoadInteger(2), vec![]).unwrap()[0];
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        let program = builder.finalize().unwrap();
        assert_eq!(program.number_of_variables(), 2);
    }

    #[test]
    fn unbalanced_block_is_rejected_at_finalize() {
        let mut builder = Builder::new();
        let cond = builder.emit(Opcode::LoadBoolean(true), vec![]).unwrap()[0];
        builder.open_block(Opcode::BeginIf, vec![cond]).unwrap();
        let err = builder.finalize().unwrap_err();
        assert!(matches!(err, crate::error::BuildError::UnbalancedBlock));
    }

    #[test]
    fn context_violation_is_rejected() {
        let mut builder = Builder::new();
        // `Break` outside any loop requires `loop` context we don't have.
        let err = builder.emit(Opcode::Break, vec![]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::ContextViolation { .. }));
    }

    #[test]
    fn break_is_legal_inside_a_loop() {
        let mut builder = Builder::new();
        let start = builder.emit(Opcode::LoadInteger(0), vec![]).unwrap()[0];
        let limit = builder.emit(Opcode::LoadInteger(10), vec![]).unwrap()[0];
        let step = builder.emit(Opcode::LoadInteger(1), vec![]).unwrap()[0];
        builder.open_block(Opcode::BeginFor, vec![start, limit, step]).unwrap();
        builder.emit(Opcode::Break, vec![]).unwrap();
        builder.close_block(Opcode::EndFor, vec![]).unwrap();
        let program = builder.finalize().unwrap();
        assert!(program.validate().is_ok());
    }

    #[test]
    fn try_catch_is_one_balanced_block_and_round_trips_through_validate() {
        let mut builder = Builder::new();
        builder.open_block(Opcode::BeginTry, vec![]).unwrap();
        let caught = builder.begin_interior(Opcode::BeginCatch, vec![]).unwrap();
        assert_eq!(caught.len(), 1, "BeginCatch's inner output is the caught exception binding");
        builder.emit(Opcode::Throw, vec![caught[0]]).unwrap();
        builder.close_block(Opcode::EndTryCatch, vec![]).unwrap();
        let program = builder.finalize().unwrap();

        assert_eq!(program.len(), 4);
        assert!(program.validate().is_ok(), "a program built with begin_interior must pass re-validation on deserialize");
    }

    #[test]
    fn catch_context_does_not_leak_into_the_try_body() {
        // `Yield` requires `generator` context; it must be rejected both
        // before `BeginCatch` (plain try body) and it must only become legal
        // after `BeginCatch` once we're actually inside a generator.
        let mut builder = Builder::new();
        builder
            .open_block(Opcode::BeginFunctionDefinition { kind: FunctionKind::Generator, parameter_count: 0 }, vec![])
            .unwrap();
        builder.open_block(Opcode::BeginTry, vec![]).unwrap();
        let err = builder.emit(Opcode::Break, vec![]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::ContextViolation { .. }), "try body is not loop context");
        builder.begin_interior(Opcode::BeginCatch, vec![]).unwrap();
        // generator context propagated in from the enclosing function is
        // still visible inside the catch body.
        let yielded = builder.emit(Opcode::LoadInteger(0), vec![]).unwrap()[0];
        builder.emit(Opcode::Yield, vec![yielded]).unwrap();
        builder.close_block(Opcode::EndTryCatch, vec![]).unwrap();
        builder.close_block(Opcode::EndFunctionDefinition, vec![]).unwrap();
        let program = builder.finalize().unwrap();
        assert!(program.validate().is_ok());
    }

    #[test]
    fn begin_interior_at_top_level_is_rejected() {
        let mut builder = Builder::new();
        let err = builder.begin_interior(Opcode::BeginCatch, vec![]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::UnbalancedBlock));
    }

    #[test]
    fn non_propagating_block_does_not_leak_context_to_a_sibling_read_via_current() {
        // A function nested in a for-loop must not see `loop` context, even
        // though the for-loop is its lexical ancestor on the stack.
        let mut builder = Builder::new();
        let start = builder.emit(Opcode::LoadInteger(0), vec![]).unwrap()[0];
        let limit = builder.emit(Opcode::LoadInteger(10), vec![]).unwrap()[0];
        let step = builder.emit(Opcode::LoadInteger(1), vec![]).unwrap()[0];
        builder.open_block(Opcode::BeginFor, vec![start, limit, step]).unwrap();
        builder.open_block(Opcode::BeginFunctionDefinition { kind: FunctionKind::Plain, parameter_count: 0 }, vec![]).unwrap();
        let err = builder.emit(Opcode::Break, vec![]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::ContextViolation { .. }), "loop context must not leak into a nested function");
    }

    #[test]
    fn variable_overflow_is_a_build_error_not_a_silent_truncation() {
        let mut builder = Builder::new();
        for _ in 0..MAX_VARIABLES {
            builder.emit(Opcode::LoadInteger(0), vec![]).unwrap();
        }
        assert_eq!(builder.next_variable_count(), MAX_VARIABLES);
        let err = builder.emit(Opcode::LoadInteger(0), vec![]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::VariableOverflow { attempted } if attempted == MAX_VARIABLES));
        // The rejected instruction must not have been appended.
        assert_eq!(builder.instruction_count() as u32, MAX_VARIABLES);
    }
}
