//! Shared low-level helpers the structural mutators
//! ([`super::mutators::codegen`], [`super::mutators::splice`],
//! [`super::mutators::combine`]) use to splice instruction sequences
//! together and renumber variables, without duplicating the same
//! context/variable bookkeeping three times.

use crate::error::BuildError;
use crate::il::{Builder, Context, Instruction, Variable};

/// Replays `instructions[..upto]` into a fresh `Builder`, reproducing its
/// variable numbering and context/scope state exactly (replaying an
/// already-valid prefix never fails `Builder`'s own checks). Used to
/// "resume" building at an arbitrary position inside a parent program.
pub fn replay_prefix(instructions: &[Instruction], upto: usize) -> Result<Builder, BuildError> {
    let mut builder = Builder::new();
    for instr in &instructions[..upto] {
        if instr.opens_block() {
            builder.open_block(instr.opcode.clone(), instr.inputs.clone())?;
        } else if instr.closes_block() {
            builder.close_block(instr.opcode.clone(), instr.inputs.clone())?;
        } else if instr.is_block_start() || instr.is_block_end() {
            builder.begin_interior(instr.opcode.clone(), instr.inputs.clone())?;
        } else {
            builder.emit(instr.opcode.clone(), instr.inputs.clone())?;
        }
    }
    Ok(builder)
}

/// Replays every instruction in `instructions` into `builder`, shifting
/// every variable reference at or above `shift_threshold` by `delta`.
/// Output variables are never shifted manually — `Builder` allocates them
/// fresh in sequence, which lands on the shifted indices automatically
/// since it resumes numbering from wherever `builder` already is.
pub fn replay_shifted(builder: &mut Builder, instructions: &[Instruction], shift_threshold: u32, delta: u32) -> Result<(), BuildError> {
    for instr in instructions {
        let inputs: Vec<Variable> = instr.inputs.iter().map(|v| shift(*v, shift_threshold, delta)).collect();
        if instr.opens_block() {
            builder.open_block(instr.opcode.clone(), inputs)?;
        } else if instr.closes_block() {
            builder.close_block(instr.opcode.clone(), inputs)?;
        } else if instr.is_block_start() || instr.is_block_end() {
            builder.begin_interior(instr.opcode.clone(), inputs)?;
        } else {
            builder.emit(instr.opcode.clone(), inputs)?;
        }
    }
    Ok(())
}

fn shift(v: Variable, threshold: u32, delta: u32) -> Variable {
    if v.raw() >= threshold {
        Variable::new(v.raw() + delta)
    } else {
        v
    }
}

/// The union context active immediately before each instruction, plus one
/// trailing entry for the position after the last instruction.
/// `context_before(instrs)[i]` is the context in effect just before
/// `instrs[i]` would execute.
pub fn context_before(instructions: &[Instruction]) -> Vec<Context> {
    // `stack` holds each frame's already-fully-resolved context, innermost
    // last — mirroring `il::context::ContextStack`. Only the top frame is
    // ever in effect; folding over every ancestor would re-add bits a
    // non-propagating block was supposed to drop.
    let mut stack = vec![Context::JAVASCRIPT];
    let mut out = Vec::with_capacity(instructions.len() + 1);
    for instr in instructions {
        if instr.closes_block() && stack.len() > 1 {
            stack.pop();
        }
        out.push(*stack.last().expect("frame stack never empty"));
        if instr.opens_block() {
            let inner = if instr.opcode.attributes().propagates_surrounding_context {
                out.last().copied().unwrap_or(Context::JAVASCRIPT).union(instr.opcode.introduced_context())
            } else {
                Context::JAVASCRIPT.union(instr.opcode.introduced_context())
            };
            stack.push(inner);
        } else if instr.is_block_start() || instr.is_block_end() {
            if let Some(top) = stack.last_mut() {
                *top = top.union(instr.opcode.introduced_context());
            }
        }
    }
    out.push(*stack.last().expect("frame stack never empty"));
    out
}

/// Indices at which a top-level (depth-1, i.e. no open block) instruction
/// sequence could be inserted without crossing a block boundary. Always
/// includes `0` and `instructions.len()`.
pub fn top_level_insertion_points(instructions: &[Instruction]) -> Vec<usize> {
    let mut depth = 1i32;
    let mut points = vec![0usize];
    for (i, instr) in instructions.iter().enumerate() {
        if instr.closes_block() {
            depth -= 1;
        }
        if instr.opens_block() {
            depth += 1;
        }
        if depth == 1 {
            points.push(i + 1);
        }
    }
    points
}

/// `true` if `range` is itself block-balanced: every open has a matching
/// close within the range, and the range never closes more than it opened.
pub fn is_block_balanced(range: &[Instruction]) -> bool {
    let mut depth = 0i32;
    for instr in range {
        if instr.opens_block() {
            depth += 1;
        }
        if instr.closes_block() {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Builder as B, Opcode};

    #[test]
    fn replaying_a_valid_prefix_reproduces_variable_numbering() {
        let mut builder = B::new();
        let a = builder.emit(Opcode::LoadInteger(1), vec![]).unwrap()[0];
        let b = builder.emit(Opcode::LoadInteger(2), vec![]).unwrap()[0];
        builder.emit(Opcode::Reassign, vec![a, b]).unwrap();
        let program = builder.finalize().unwrap();

        let replayed = replay_prefix(program.instructions(), 2).unwrap();
        assert_eq!(replayed.next_variable_count(), 2);
    }

    #[test]
    fn top_level_points_exclude_inside_an_open_block() {
        let mut builder = B::new();
        let cond = builder.emit(Opcode::LoadBoolean(true), vec![]).unwrap()[0];
        builder.open_block(Opcode::BeginIf, vec![cond]).unwrap();
        builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
        builder.close_block(Opcode::EndIf, vec![]).unwrap();
        let program = builder.finalize().unwrap();

        let points = top_level_insertion_points(program.instructions());
        // instruction 2 (the LoadInteger inside the if) is not a valid point.
        assert!(!points.contains(&2));
        assert!(points.contains(&0));
        assert!(points.contains(&program.len()));
    }
}
