//! The closed set of language constructs legal at a given program point.
//!
//! `Context` is a bit-set rather than a single enum value because nested
//! blocks accumulate context: code inside a `for` loop body that is itself
//! inside an `async function` is simultaneously in `loop`, `subroutine`, and
//! `async` context. Operations declare a `required` context that must be a
//! subset of whatever is active at their position (invariant 4).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A bit-set of legal language constructs at some program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Context(u16);

impl Context {
    pub const JAVASCRIPT: Context = Context(1 << 0);
    pub const SUBROUTINE: Context = Context(1 << 1);
    pub const LOOP: Context = Context(1 << 2);
    pub const GENERATOR: Context = Context(1 << 3);
    pub const ASYNC: Context = Context(1 << 4);
    pub const WITH: Context = Context(1 << 5);
    pub const CATCH: Context = Context(1 << 6);
    pub const CLASS: Context = Context(1 << 7);

    /// The empty context, no constructs legal. Never valid at runtime but
    /// useful as an accumulator starting point.
    pub const EMPTY: Context = Context(0);

    /// All declared constructs; used only in tests that need "anything goes".
    pub const ALL: Context = Context(0x00FF);

    /// Returns `true` if every bit set in `required` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn contains(self, required: Context) -> bool {
        (self.0 & required.0) == required.0
    }

    /// Returns `true` if `self` and `other` share no bits.
    #[inline]
    #[must_use]
    pub fn is_disjoint(self, other: Context) -> bool {
        (self.0 & other.0) == 0
    }

    /// Union of `self` and `other`.
    #[inline]
    #[must_use]
    pub fn union(self, other: Context) -> Context {
        Context(self.0 | other.0)
    }

    /// `self` with the bits of `remove` cleared.
    #[inline]
    #[must_use]
    pub fn without(self, remove: Context) -> Context {
        Context(self.0 & !remove.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Context {
    type Output = Context;
    fn bitor(self, rhs: Context) -> Context {
        self.union(rhs)
    }
}

impl BitOrAssign for Context {
    fn bitor_assign(&mut self, rhs: Context) {
        *self = self.union(rhs);
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::JAVASCRIPT
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMED: &[(Context, &str)] = &[
            (Context::JAVASCRIPT, "javascript"),
            (Context::SUBROUTINE, "subroutine"),
            (Context::LOOP, "loop"),
            (Context::GENERATOR, "generator"),
            (Context::ASYNC, "async"),
            (Context::WITH, "with"),
            (Context::CATCH, "catch"),
            (Context::CLASS, "class"),
        ];
        let mut first = true;
        for (flag, name) in NAMED {
            if self.contains(*flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "empty")?;
        }
        Ok(())
    }
}

/// One nested scope's worth of context, pushed by a block-opening
/// instruction and popped by its matching block-closing instruction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContextFrame {
    /// Context made available to instructions inside this block.
    pub inner: Context,
}

/// Tracks the stack of active context frames during building.
///
/// `currentContextAt(0) == {javascript}` per invariant 4; this is the
/// implicit bottom frame that is never popped.
#[derive(Debug, Clone)]
pub(crate) struct ContextStack {
    frames: Vec<ContextFrame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self {
            frames: vec![ContextFrame { inner: Context::JAVASCRIPT }],
        }
    }

    /// The context visible at the current position: the innermost frame's
    /// `inner`, which is already fully resolved at push time (either unioned
    /// with its parent for a propagating opener, or reset to a bare
    /// `JAVASCRIPT` base for a non-propagating one). Folding over every
    /// frame instead would silently re-add whatever bits a non-propagating
    /// opener was supposed to drop.
    pub fn current(&self) -> Context {
        self.frames.last().expect("frame stack never empty").inner
    }

    pub fn push(&mut self, inner: Context) {
        self.frames.push(ContextFrame { inner });
    }

    /// Folds `additional` into the innermost frame in place, without
    /// changing stack depth. Used by interior markers (`BeginCatch`,
    /// `BeginElse`) that continue inside their parent's still-open frame
    /// rather than pushing one of their own.
    pub fn union_into_current(&mut self, additional: Context) {
        let top = self.frames.last_mut().expect("frame stack never empty");
        top.inner = top.inner.union(additional);
    }

    /// Pops the innermost frame. Returns `false` if only the implicit
    /// bottom frame remains (caller attempted to close more blocks than
    /// were opened).
    pub fn pop(&mut self) -> bool {
        if self.frames.len() <= 1 {
            return false;
        }
        self.frames.pop();
        true
    }

    /// `true` iff only the implicit top-level frame remains.
    pub fn is_top_level(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
