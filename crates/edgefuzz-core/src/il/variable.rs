//! Dense variable identifiers used throughout the IL.

use std::fmt;

/// Hard cap on the number of variables a single [`Program`](super::program::Program)
/// may define. Mirrors the wire format's use of a 16-bit slot index.
pub const MAX_VARIABLES: u32 = 1 << 16;

/// A single-assignment variable identifier.
///
/// Variable numbers are dense and monotonically increasing in the order
/// their defining instruction appears in the program (invariant 5 in the
/// data model). `Variable` is `Copy` and cheap to pass by value everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Variable(u32);

impl Variable {
    /// Wraps a raw index as a `Variable` without checking the [`MAX_VARIABLES`] cap.
    ///
    /// Callers that allocate fresh variables must go through
    /// [`super::builder::Builder::emit`], which enforces the cap; this
    /// constructor exists for deserialization and tests.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw `u32` value, as stored on the wire.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
