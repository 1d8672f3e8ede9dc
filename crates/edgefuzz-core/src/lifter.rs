//! Turns an [`il::Program`](crate::il::Program) into source text the target
//! interpreter can run.
//!
//! The target language's concrete syntax is out of scope here (§1, §6.3):
//! this module only defines the trait boundary a real lifter plugs into,
//! plus a placeholder used by tests and the CLI's dry-run mode.

use crate::il::Program;

/// Rendering knobs a lifter implementation may honor. Not every lifter
/// needs to honor every option; unsupported options are simply ignored.
#[derive(Debug, Clone, Copy)]
pub struct LifterOptions {
    pub minify: bool,
    pub include_comments: bool,
    pub include_types: bool,
    pub include_history: bool,
}

impl Default for LifterOptions {
    fn default() -> Self {
        Self { minify: false, include_comments: false, include_types: false, include_history: false }
    }
}

/// Converts IL to source text. Implementations are expected to be total:
/// every well-formed [`Program`] (one that passed `Program::validate`) must
/// lift to *some* string, never fail.
pub trait Lifter {
    fn lift(&self, program: &Program, options: &LifterOptions) -> String;
}

/// A placeholder lifter that renders one opcode name per line, annotated
/// with its output variables. Not a real target-language emitter; stands in
/// for one in tests and the CLI's `--dry-run` mode, where no concrete
/// target syntax is needed.
#[derive(Debug, Default)]
pub struct NullLifter;

impl Lifter for NullLifter {
    fn lift(&self, program: &Program, options: &LifterOptions) -> String {
        let mut out = String::new();
        if options.include_history {
            for note in &program.history().entries {
                out.push_str("// ");
                out.push_str(note);
                out.push('\n');
            }
        }
        for instruction in program.instructions() {
            if !options.minify {
                for output in &instruction.outputs {
                    out.push_str(&output.to_string());
                    out.push_str(", ");
                }
            }
            out.push_str(&format!("{:?}", instruction.opcode));
            if options.include_comments {
                out.push_str("  // ");
                out.push_str(&format!("{:?}", instruction.inputs));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_lifter_produces_one_line_per_instruction() {
        let builder = crate::il::Builder::new();
        let program = builder.finalize().unwrap();
        let text = NullLifter.lift(&program, &LifterOptions::default());
        assert!(text.is_empty());
    }
}
