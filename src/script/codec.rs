//! Native script wire codec
//!
//! Scripts travel as CBOR arrays tagged by their first element:
//!
//! ```text
//! [0, h'<28-byte key hash>']      sig
//! [1, [script, ...]]              all
//! [2, [script, ...]]              any
//! [3, n, [script, ...]]           atLeast
//! [4, slot]                       invalid before (timelock start)
//! [5, slot]                       invalid hereafter (timelock expiry)
//! ```
//!
//! Encoding is canonical (definite lengths, shortest integer heads), so
//! the script hash, and every address derived from it, is stable.

use crate::address::Hash28;
use crate::crypto::{blake2b_224, HASH28_LEN};
use crate::script::native::NativeScript;
use thiserror::Error;

/// Hash prefix distinguishing native scripts from Plutus scripts
pub const NATIVE_SCRIPT_TAG: u8 = 0x00;

/// Maximum nesting accepted when decoding untrusted input
const MAX_DECODE_DEPTH: usize = 64;

pub(crate) const MAJOR_UINT: u8 = 0;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_ARRAY: u8 = 4;
const BREAK: u8 = 0xff;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while encoding or decoding script CBOR
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),
    #[error("Expected CBOR major type {expected}, found {found} at offset {offset}")]
    UnexpectedMajor { expected: u8, found: u8, offset: usize },
    #[error("Unsupported CBOR head {0:#04x}")]
    UnsupportedHead(u8),
    #[error("Unknown native script tag: {0}")]
    UnknownTag(u64),
    #[error("Native script array has wrong length: tag {tag}, length {len}")]
    WrongArity { tag: u64, len: usize },
    #[error("Invalid key hash: {0}")]
    InvalidKeyHash(String),
    #[error("Value out of range: {0}")]
    OutOfRange(u64),
    #[error("Script nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("Trailing bytes after script: {0}")]
    TrailingBytes(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

// =============================================================================
// Encoding
// =============================================================================

pub(crate) fn write_head(out: &mut Vec<u8>, major: u8, value: u64) {
    let major = major << 5;
    if value < 24 {
        out.push(major | value as u8);
    } else if value <= u8::MAX as u64 {
        out.push(major | 24);
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(major | 25);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(major | 26);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn encode_into(script: &NativeScript, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match script {
        NativeScript::Sig { key_hash } => {
            let bytes = hex::decode(key_hash)
                .map_err(|_| CodecError::InvalidKeyHash(key_hash.clone()))?;
            if bytes.len() != HASH28_LEN {
                return Err(CodecError::InvalidKeyHash(key_hash.clone()));
            }
            write_head(out, MAJOR_ARRAY, 2);
            write_head(out, MAJOR_UINT, 0);
            write_head(out, MAJOR_BYTES, bytes.len() as u64);
            out.extend_from_slice(&bytes);
        }
        NativeScript::All { scripts } | NativeScript::Any { scripts } => {
            let tag = if matches!(script, NativeScript::All { .. }) { 1 } else { 2 };
            write_head(out, MAJOR_ARRAY, 2);
            write_head(out, MAJOR_UINT, tag);
            encode_list(scripts, out)?;
        }
        NativeScript::AtLeast { required, scripts } => {
            write_head(out, MAJOR_ARRAY, 3);
            write_head(out, MAJOR_UINT, 3);
            write_head(out, MAJOR_UINT, *required as u64);
            encode_list(scripts, out)?;
        }
        NativeScript::TimelockStart { slot } => {
            write_head(out, MAJOR_ARRAY, 2);
            write_head(out, MAJOR_UINT, 4);
            write_head(out, MAJOR_UINT, *slot);
        }
        NativeScript::TimelockExpiry { slot } => {
            write_head(out, MAJOR_ARRAY, 2);
            write_head(out, MAJOR_UINT, 5);
            write_head(out, MAJOR_UINT, *slot);
        }
    }
    Ok(())
}

fn encode_list(scripts: &[NativeScript], out: &mut Vec<u8>) -> Result<(), CodecError> {
    write_head(out, MAJOR_ARRAY, scripts.len() as u64);
    for child in scripts {
        encode_into(child, out)?;
    }
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Length of an array head: definite or indefinite
enum ArrayLen {
    Definite(usize),
    Indefinite,
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEnd(self.bytes.len()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Reads a head, returning (major, argument); `None` argument marks
    /// an indefinite length
    fn head(&mut self) -> Result<(u8, Option<u64>), CodecError> {
        let offset = self.pos;
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let value = match info {
            0..=23 => Some(info as u64),
            24 => Some(self.byte()? as u64),
            25 => {
                let b = self.take(2)?;
                Some(u16::from_be_bytes([b[0], b[1]]) as u64)
            }
            26 => {
                let b = self.take(4)?;
                Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            27 => {
                let b = self.take(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(b);
                Some(u64::from_be_bytes(buf))
            }
            31 if major == MAJOR_ARRAY || major == MAJOR_BYTES => None,
            _ => {
                self.pos = offset;
                return Err(CodecError::UnsupportedHead(initial));
            }
        };
        Ok((major, value))
    }

    fn expect_major(&mut self, expected: u8) -> Result<Option<u64>, CodecError> {
        let offset = self.pos;
        let (major, value) = self.head()?;
        if major != expected {
            return Err(CodecError::UnexpectedMajor {
                expected,
                found: major,
                offset,
            });
        }
        Ok(value)
    }

    fn uint(&mut self) -> Result<u64, CodecError> {
        let offset = self.pos;
        self.expect_major(MAJOR_UINT)?
            .ok_or(CodecError::UnsupportedHead(self.bytes[offset]))
    }

    fn array(&mut self) -> Result<ArrayLen, CodecError> {
        Ok(match self.expect_major(MAJOR_ARRAY)? {
            Some(len) => ArrayLen::Definite(len as usize),
            None => ArrayLen::Indefinite,
        })
    }

    fn byte_string(&mut self) -> Result<Vec<u8>, CodecError> {
        match self.expect_major(MAJOR_BYTES)? {
            Some(len) => Ok(self.take(len as usize)?.to_vec()),
            None => {
                let mut out = Vec::new();
                while self.peek() != Some(BREAK) {
                    let len = self
                        .expect_major(MAJOR_BYTES)?
                        .ok_or(CodecError::UnsupportedHead(0x5f))?;
                    out.extend_from_slice(self.take(len as usize)?);
                }
                self.byte()?;
                Ok(out)
            }
        }
    }

    /// True when another element of an array of the given length follows
    fn has_next(&mut self, len: &ArrayLen, read: usize) -> Result<bool, CodecError> {
        match len {
            ArrayLen::Definite(n) => Ok(read < *n),
            ArrayLen::Indefinite => match self.peek() {
                Some(BREAK) => {
                    self.pos += 1;
                    Ok(false)
                }
                Some(_) => Ok(true),
                None => Err(CodecError::UnexpectedEnd(self.pos)),
            },
        }
    }

    fn script(&mut self, depth: usize) -> Result<NativeScript, CodecError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(CodecError::TooDeep(MAX_DECODE_DEPTH));
        }

        let len = self.array()?;
        let mut read = 0;
        if !self.has_next(&len, read)? {
            return Err(CodecError::WrongArity { tag: 0, len: 0 });
        }
        let tag = self.uint()?;
        read += 1;

        let field = |dec: &mut Self, read: &mut usize| -> Result<(), CodecError> {
            if !dec.has_next(&len, *read)? {
                return Err(CodecError::WrongArity { tag, len: *read });
            }
            *read += 1;
            Ok(())
        };

        let script = match tag {
            0 => {
                field(self, &mut read)?;
                let bytes = self.byte_string()?;
                if bytes.len() != HASH28_LEN {
                    return Err(CodecError::InvalidKeyHash(hex::encode(&bytes)));
                }
                NativeScript::Sig {
                    key_hash: hex::encode(bytes),
                }
            }
            1 | 2 => {
                field(self, &mut read)?;
                let scripts = self.script_list(depth)?;
                if tag == 1 {
                    NativeScript::All { scripts }
                } else {
                    NativeScript::Any { scripts }
                }
            }
            3 => {
                field(self, &mut read)?;
                let required = self.uint()?;
                let required =
                    u32::try_from(required).map_err(|_| CodecError::OutOfRange(required))?;
                field(self, &mut read)?;
                let scripts = self.script_list(depth)?;
                NativeScript::AtLeast { required, scripts }
            }
            4 | 5 => {
                field(self, &mut read)?;
                let slot = self.uint()?;
                if tag == 4 {
                    NativeScript::TimelockStart { slot }
                } else {
                    NativeScript::TimelockExpiry { slot }
                }
            }
            other => return Err(CodecError::UnknownTag(other)),
        };

        if self.has_next(&len, read)? {
            return Err(CodecError::WrongArity { tag, len: read + 1 });
        }
        Ok(script)
    }

    fn script_list(&mut self, depth: usize) -> Result<Vec<NativeScript>, CodecError> {
        let len = self.array()?;
        let mut scripts = Vec::new();
        while self.has_next(&len, scripts.len())? {
            scripts.push(self.script(depth + 1)?);
        }
        Ok(scripts)
    }
}

// =============================================================================
// Public API
// =============================================================================

impl NativeScript {
    /// Canonical CBOR encoding
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        encode_into(self, &mut out)?;
        Ok(out)
    }

    /// Canonical CBOR encoding as hex
    pub fn to_hex(&self) -> Result<String, CodecError> {
        Ok(hex::encode(self.encode()?))
    }

    /// Strict decoding: any malformed input is an error
    pub fn try_decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(bytes);
        let script = decoder.script(0)?;
        if decoder.pos != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - decoder.pos));
        }
        Ok(script)
    }

    pub fn try_from_hex(cbor_hex: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(cbor_hex.trim())
            .map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::try_decode(&bytes)
    }

    /// Lenient decoding
    ///
    /// Malformed input yields the degenerate `AtLeast(1, [])` policy
    /// instead of an error. Callers must check `is_degenerate()`.
    pub fn decode(bytes: &[u8]) -> Self {
        Self::try_decode(bytes).unwrap_or_else(|err| {
            log::warn!("Native script decode failed, using degenerate policy: {}", err);
            Self::degenerate()
        })
    }

    pub fn from_hex(cbor_hex: &str) -> Self {
        Self::try_from_hex(cbor_hex).unwrap_or_else(|err| {
            log::warn!("Native script decode failed, using degenerate policy: {}", err);
            Self::degenerate()
        })
    }

    /// Script hash of the canonical encoding
    pub fn script_hash(&self) -> Result<Hash28, CodecError> {
        Ok(native_script_hash(&self.encode()?))
    }
}

/// Script hash: BLAKE2b-224 over the tag byte and the script bytes
///
/// The ledger hashes the bytes as submitted, so a script received in a
/// non-canonical form (indefinite arrays, long heads) must be hashed from
/// those bytes rather than from a re-encoding.
pub fn native_script_hash(script_bytes: &[u8]) -> Hash28 {
    let mut preimage = Vec::with_capacity(script_bytes.len() + 1);
    preimage.push(NATIVE_SCRIPT_TAG);
    preimage.extend_from_slice(script_bytes);
    Hash28(blake2b_224(&preimage))
}

// =============================================================================
// Tests
// =============================================================================
