//! Bit-exact REPRL wire protocol encoding/decoding (§4.5, §6.2).
//!
//! This module only knows how to turn requests into bytes and status words
//! into [`Outcome`]s; it has no opinion about how those bytes cross a
//! process boundary — that's [`super::transport::ReprlTransport`].

use crate::runner::execution::Outcome;

/// The literal 4-byte request token written to the control channel before
/// every script.
pub const REQUEST_TOKEN: [u8; 4] = *b"cexe";

/// Builds the 12-byte control-channel request: `"cexe"` followed by the
/// little-endian 64-bit script length.
pub fn encode_request(script_len: u64) -> [u8; 12] {
    let mut buf = [0u8; 12];
    buf[0..4].copy_from_slice(&REQUEST_TOKEN);
    buf[4..12].copy_from_slice(&script_len.to_le_bytes());
    buf
}

/// Bit layout of the 32-bit little-endian status word the child writes
/// back: bits 0-6 signal, bit 7 did-signal, bits 8-15 exit code, bit 16
/// did-exit, bit 17 did-timeout, bit 18 no-further-requests, remaining
/// bits reserved zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u32);

const SIGNAL_MASK: u32 = 0x7F;
const DID_SIGNAL_BIT: u32 = 1 << 7;
const EXIT_CODE_SHIFT: u32 = 8;
const EXIT_CODE_MASK: u32 = 0xFF << EXIT_CODE_SHIFT;
const DID_EXIT_BIT: u32 = 1 << 16;
const DID_TIMEOUT_BIT: u32 = 1 << 17;
const NO_FURTHER_REQUESTS_BIT: u32 = 1 << 18;
const RESERVED_MASK: u32 = !(SIGNAL_MASK | DID_SIGNAL_BIT | EXIT_CODE_MASK | DID_EXIT_BIT | DID_TIMEOUT_BIT | NO_FURTHER_REQUESTS_BIT);

impl StatusWord {
    pub fn did_signal(self) -> bool {
        self.0 & DID_SIGNAL_BIT != 0
    }

    pub fn signal(self) -> i32 {
        (self.0 & SIGNAL_MASK) as i32
    }

    pub fn did_exit(self) -> bool {
        self.0 & DID_EXIT_BIT != 0
    }

    pub fn exit_code(self) -> i32 {
        ((self.0 & EXIT_CODE_MASK) >> EXIT_CODE_SHIFT) as i32
    }

    pub fn did_timeout(self) -> bool {
        self.0 & DID_TIMEOUT_BIT != 0
    }

    pub fn no_further_requests(self) -> bool {
        self.0 & NO_FURTHER_REQUESTS_BIT != 0
    }

    /// `true` if any reserved bit is set — a malformed word we should
    /// refuse to interpret rather than silently ignore (§7:
    /// `RunnerError::MalformedStatusWord`).
    pub fn has_reserved_bits_set(self) -> bool {
        self.0 & RESERVED_MASK != 0
    }

    /// Decodes the outcome. `did_exit`/`did_timeout` are informational
    /// confirmation bits; the authoritative signal is `did_timeout()` for
    /// a timeout, `did_signal()` for a crash, and otherwise the exit code
    /// value itself (zero succeeds, non-zero fails) — matching the
    /// worked example in spec.md §8 scenario 5, where `0x00000100`
    /// (exit code 1) decodes as `failed(1)` without the `did_exit` bit
    /// being part of the test fixture's word.
    pub fn to_outcome(self) -> Outcome {
        if self.did_timeout() {
            Outcome::TimedOut
        } else if self.did_signal() {
            Outcome::Crashed { signal: self.signal() }
        } else if self.exit_code() != 0 {
            Outcome::Failed(self.exit_code())
        } else {
            Outcome::Succeeded
        }
    }

    pub fn encode(outcome: Outcome, no_further_requests: bool) -> u32 {
        let mut word = 0u32;
        if no_further_requests {
            word |= NO_FURTHER_REQUESTS_BIT;
        }
        match outcome {
            Outcome::Succeeded => word |= DID_EXIT_BIT,
            Outcome::Failed(code) => {
                word |= DID_EXIT_BIT;
                word |= ((code as u32) << EXIT_CODE_SHIFT) & EXIT_CODE_MASK;
            }
            Outcome::Crashed { signal } => {
                word |= DID_SIGNAL_BIT;
                word |= (signal as u32) & SIGNAL_MASK;
            }
            Outcome::TimedOut => word |= DID_TIMEOUT_BIT,
        }
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_token_is_bit_exact() {
        let req = encode_request(42);
        assert_eq!(&req[0..4], b"cexe");
        assert_eq!(u64::from_le_bytes(req[4..12].try_into().unwrap()), 42);
    }

    #[test]
    fn status_word_round_trips_through_each_outcome() {
        for outcome in [Outcome::Succeeded, Outcome::Failed(1), Outcome::Crashed { signal: 11 }, Outcome::TimedOut] {
            let word = StatusWord(StatusWord::encode(outcome, false));
            assert_eq!(word.to_outcome(), outcome);
            assert!(!word.has_reserved_bits_set());
        }
    }

    #[test]
    fn failed_exit_code_one_parses_as_failed() {
        // Scenario 5 of spec.md §8: status word 0x00000100 -> failed(1).
        let word = StatusWord(0x0000_0100);
        assert_eq!(word.to_outcome(), Outcome::Failed(1));
    }
}
