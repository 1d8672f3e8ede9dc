//! On-disk IL serialization (§6.1): `serde` + `postcard`, with a leading
//! format-version byte so a future incompatible layout change fails loudly
//! instead of decoding garbage.
//!
//! Every serialized record is `[version: u8][length: u64 LE][postcard bytes]`.
//! The length prefix lets `corpus::Corpus::export_state` concatenate many
//! records into one flat byte stream and `import_state` walk them back out
//! one at a time, mirroring the REPRL wire protocol's own
//! length-then-payload framing (§4.5) rather than inventing a new shape.

use crate::error::SerializationError;
use crate::il::Program;

/// Bumped whenever the wire layout of a serialized `Program` changes in a
/// way older readers can't handle.
const FORMAT_VERSION: u8 = 1;

/// Serializes one `Program` as `[version][length][postcard bytes]`.
pub fn serialize_program(program: &Program) -> Result<Vec<u8>, SerializationError> {
    let payload = postcard::to_allocvec(program)?;
    let mut out = Vec::with_capacity(1 + 8 + payload.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Reads one length-prefixed `Program` record from the front of `bytes`,
/// returning it along with the remaining, unconsumed tail.
pub fn deserialize_program(bytes: &[u8]) -> Result<(Program, &[u8]), SerializationError> {
    if bytes.is_empty() {
        return Err(SerializationError::Postcard(postcard::Error::DeserializeUnexpectedEnd));
    }
    let version = bytes[0];
    if version != FORMAT_VERSION {
        return Err(SerializationError::VersionMismatch { expected: FORMAT_VERSION, found: version });
    }
    if bytes.len() < 9 {
        return Err(SerializationError::Postcard(postcard::Error::DeserializeUnexpectedEnd));
    }
    let length = u64::from_le_bytes(bytes[1..9].try_into().expect("9-byte slice")) as usize;
    let body_start = 9;
    let body_end = body_start.checked_add(length).ok_or(SerializationError::Postcard(postcard::Error::DeserializeUnexpectedEnd))?;
    if bytes.len() < body_end {
        return Err(SerializationError::Postcard(postcard::Error::DeserializeUnexpectedEnd));
    }
    let program: Program = postcard::from_bytes(&bytes[body_start..body_end])?;
    Ok((program, &bytes[body_end..]))
}

/// Serializes a whole sequence of programs as a flat concatenation of
/// length-prefixed records (one `Corpus::export_state` dump).
pub fn serialize_programs<'a>(programs: impl IntoIterator<Item = &'a Program>) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::new();
    for program in programs {
        out.extend_from_slice(&serialize_program(program)?);
    }
    Ok(out)
}

/// Walks a flat concatenation of length-prefixed records back into
/// `Program`s, in order. Stops and returns what it successfully decoded
/// once the tail is empty; any malformed trailing bytes are an error.
pub fn deserialize_programs(mut bytes: &[u8]) -> Result<Vec<Program>, SerializationError> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let (program, rest) = deserialize_program(bytes)?;
        out.push(program);
        bytes = rest;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Builder, Opcode};

    fn sample_program() -> Program {
        let mut builder = Builder::new();
        builder.emit(Opcode::LoadInteger(42), vec![]).unwrap();
        builder.finalize().unwrap()
    }

    #[test]
    fn round_trips_a_single_program() {
        let program = sample_program();
        let bytes = serialize_program(&program).unwrap();
        let (decoded, rest) = deserialize_program(&bytes).unwrap();
        assert_eq!(decoded, program);
        assert!(rest.is_empty());
    }

    #[test]
    fn round_trips_several_concatenated_programs() {
        let programs = vec![sample_program(), sample_program(), Builder::new().finalize().unwrap()];
        let bytes = serialize_programs(&programs).unwrap();
        let decoded = deserialize_programs(&bytes).unwrap();
        assert_eq!(decoded, programs);
    }

    #[test]
    fn rejects_a_mismatched_format_version() {
        let program = sample_program();
        let mut bytes = serialize_program(&program).unwrap();
        bytes[0] = FORMAT_VERSION.wrapping_add(1);
        let err = deserialize_program(&bytes).unwrap_err();
        assert!(matches!(err, SerializationError::VersionMismatch { .. }));
    }

    #[test]
    fn rejects_truncated_bytes() {
        let program = sample_program();
        let bytes = serialize_program(&program).unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(deserialize_program(truncated).is_err());
    }
}
