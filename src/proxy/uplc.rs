//! Untyped Plutus Core programs in the flat encoding
//!
//! Compiled validators are flat-encoded UPLC programs wrapped in one CBOR
//! bytestring. Applying a parameter decodes the program, wraps its term
//! as `[term (con data <param>)]` and encodes it again, which is what the
//! ledger expects from a parametrized validator.
//!
//! Flat packs values MSB first: term tags are 4 bits, builtins 7 bits,
//! naturals are 7-bit groups (least significant first) each preceded by a
//! continuation bit, lists are cons bits (`1 item ... 0`) and bytestrings
//! are byte-aligned by a `0*1` filler then written in chunks of at most
//! 255 bytes, ending with an empty chunk.

use crate::script::codec::{write_head, MAJOR_BYTES};
use thiserror::Error;

/// Terms nested deeper than this are rejected
const MAX_TERM_DEPTH: usize = 4_000;

const TERM_VAR: u8 = 0;
const TERM_DELAY: u8 = 1;
const TERM_LAMBDA: u8 = 2;
const TERM_APPLY: u8 = 3;
const TERM_CONSTANT: u8 = 4;
const TERM_FORCE: u8 = 5;
const TERM_ERROR: u8 = 6;
const TERM_BUILTIN: u8 = 7;
const TERM_CONSTR: u8 = 8;
const TERM_CASE: u8 = 9;

const TYPE_INTEGER: u8 = 0;
const TYPE_BYTESTRING: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_UNIT: u8 = 3;
const TYPE_BOOL: u8 = 4;
const TYPE_LIST: u8 = 5;
const TYPE_PAIR: u8 = 6;
const TYPE_APPLY: u8 = 7;
const TYPE_DATA: u8 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlatError {
    #[error("Program ends early at bit {0}")]
    UnexpectedEnd(usize),
    #[error("Unknown term tag {0}")]
    UnknownTermTag(u8),
    #[error("Unsupported constant type tags {0:?}")]
    UnsupportedType(Vec<u8>),
    #[error("Filler does not end on a byte boundary")]
    InvalidFiller,
    #[error("{0} bytes after the program")]
    TrailingBytes(usize),
    #[error("Natural number does not fit in 64 bits")]
    Overflow,
    #[error("String constant is not UTF-8")]
    InvalidUtf8,
    #[error("Term nesting deeper than {0}")]
    TooDeep(usize),
    #[error("Compiled code is not a single CBOR bytestring")]
    NotWrapped,
}

// =============================================================================
// Program model
// =============================================================================

/// Arbitrary-size natural as its 7-bit groups, least significant first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Natural(Vec<u8>);

impl Natural {
    pub fn from_u64(mut n: u64) -> Self {
        let mut groups = Vec::new();
        loop {
            groups.push((n & 0x7f) as u8);
            n >>= 7;
            if n == 0 {
                return Self(groups);
            }
        }
    }

    pub fn to_u64(&self) -> Result<u64, FlatError> {
        let mut n: u64 = 0;
        for (i, group) in self.0.iter().enumerate() {
            if *group == 0 {
                continue;
            }
            let shift = 7 * i as u32;
            if shift >= 64 || (u64::from(*group) << shift) >> shift != u64::from(*group) {
                return Err(FlatError::Overflow);
            }
            n |= u64::from(*group) << shift;
        }
        Ok(n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    ByteString,
    String,
    Unit,
    Bool,
    List(Box<Type>),
    Pair(Box<Type>, Box<Type>),
    Data,
}

impl Type {
    fn tags(&self, out: &mut Vec<u8>) {
        match self {
            Type::Integer => out.push(TYPE_INTEGER),
            Type::ByteString => out.push(TYPE_BYTESTRING),
            Type::String => out.push(TYPE_STRING),
            Type::Unit => out.push(TYPE_UNIT),
            Type::Bool => out.push(TYPE_BOOL),
            Type::Data => out.push(TYPE_DATA),
            Type::List(element) => {
                out.extend_from_slice(&[TYPE_APPLY, TYPE_LIST]);
                element.tags(out);
            }
            Type::Pair(first, second) => {
                out.extend_from_slice(&[TYPE_APPLY, TYPE_APPLY, TYPE_PAIR]);
                first.tags(out);
                second.tags(out);
            }
        }
    }

    fn from_tags(tags: &[u8]) -> Result<Self, FlatError> {
        let mut pos = 0;
        let ty = Self::parse(tags, &mut pos)
            .ok_or_else(|| FlatError::UnsupportedType(tags.to_vec()))?;
        if pos != tags.len() {
            return Err(FlatError::UnsupportedType(tags.to_vec()));
        }
        Ok(ty)
    }

    fn parse(tags: &[u8], pos: &mut usize) -> Option<Self> {
        let tag = *tags.get(*pos)?;
        *pos += 1;
        Some(match tag {
            TYPE_INTEGER => Type::Integer,
            TYPE_BYTESTRING => Type::ByteString,
            TYPE_STRING => Type::String,
            TYPE_UNIT => Type::Unit,
            TYPE_BOOL => Type::Bool,
            TYPE_DATA => Type::Data,
            TYPE_APPLY => match (tags.get(*pos), tags.get(*pos + 1)) {
                (Some(&TYPE_LIST), _) => {
                    *pos += 1;
                    Type::List(Box::new(Self::parse(tags, pos)?))
                }
                (Some(&TYPE_APPLY), Some(&TYPE_PAIR)) => {
                    *pos += 2;
                    let first = Self::parse(tags, pos)?;
                    Type::Pair(Box::new(first), Box::new(Self::parse(tags, pos)?))
                }
                _ => return None,
            },
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Zigzag-encoded integer
    Integer(Natural),
    ByteString(Vec<u8>),
    String(String),
    Unit,
    Bool(bool),
    List(Type, Vec<Constant>),
    Pair(Box<Constant>, Box<Constant>),
    /// Plutus data as its CBOR encoding
    Data(Vec<u8>),
}

impl Constant {
    pub fn integer(n: i64) -> Self {
        Constant::Integer(Natural::from_u64(((n << 1) ^ (n >> 63)) as u64))
    }

    pub fn type_of(&self) -> Type {
        match self {
            Constant::Integer(_) => Type::Integer,
            Constant::ByteString(_) => Type::ByteString,
            Constant::String(_) => Type::String,
            Constant::Unit => Type::Unit,
            Constant::Bool(_) => Type::Bool,
            Constant::List(element, _) => Type::List(Box::new(element.clone())),
            Constant::Pair(first, second) => {
                Type::Pair(Box::new(first.type_of()), Box::new(second.type_of()))
            }
            Constant::Data(_) => Type::Data,
        }
    }
}

/// A term with de Bruijn indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(u64),
    Delay(Box<Term>),
    Lambda(Box<Term>),
    Apply(Box<Term>, Box<Term>),
    Constant(Constant),
    Force(Box<Term>),
    Error,
    Builtin(u8),
    Constr { tag: u64, fields: Vec<Term> },
    Case { scrutinee: Box<Term>, branches: Vec<Term> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub version: (u64, u64, u64),
    pub term: Term,
}

impl Program {
    pub fn from_flat(bytes: &[u8]) -> Result<Self, FlatError> {
        let mut reader = BitReader::new(bytes);
        let version = (
            reader.natural()?.to_u64()?,
            reader.natural()?.to_u64()?,
            reader.natural()?.to_u64()?,
        );
        let term = reader.term(0)?;
        reader.filler()?;
        if reader.remaining_bytes() > 0 {
            return Err(FlatError::TrailingBytes(reader.remaining_bytes()));
        }
        Ok(Self { version, term })
    }

    pub fn to_flat(&self) -> Vec<u8> {
        let mut writer = BitWriter::default();
        writer.natural(&Natural::from_u64(self.version.0));
        writer.natural(&Natural::from_u64(self.version.1));
        writer.natural(&Natural::from_u64(self.version.2));
        writer.term(&self.term);
        writer.filler();
        writer.bytes
    }

    /// Decode compiled code: flat bytes inside one CBOR bytestring
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, FlatError> {
        Self::from_flat(unwrap_bytestring(bytes)?)
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let flat = self.to_flat();
        let mut out = Vec::with_capacity(flat.len() + 9);
        write_head(&mut out, MAJOR_BYTES, flat.len() as u64);
        out.extend(flat);
        out
    }

    /// Apply the program to a Plutus data argument given as CBOR
    pub fn apply_data(self, data_cbor: Vec<u8>) -> Self {
        Self {
            version: self.version,
            term: Term::Apply(
                Box::new(self.term),
                Box::new(Term::Constant(Constant::Data(data_cbor))),
            ),
        }
    }
}

/// Contents of a CBOR bytestring that spans the whole input
fn unwrap_bytestring(bytes: &[u8]) -> Result<&[u8], FlatError> {
    let (&head, rest) = bytes.split_first().ok_or(FlatError::NotWrapped)?;
    if head >> 5 != MAJOR_BYTES {
        return Err(FlatError::NotWrapped);
    }
    let (len, rest) = match head & 0x1f {
        info @ 0..=23 => (u64::from(info), rest),
        info @ 24..=27 => {
            let width = 1usize << (info - 24);
            if rest.len() < width {
                return Err(FlatError::NotWrapped);
            }
            let len = rest[..width]
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            (len, &rest[width..])
        }
        _ => return Err(FlatError::NotWrapped),
    };
    if rest.len() as u64 != len {
        return Err(FlatError::NotWrapped);
    }
    Ok(rest)
}

// =============================================================================
// Bit reader
// =============================================================================

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn bit(&mut self) -> Result<bool, FlatError> {
        let byte = self
            .bytes
            .get(self.pos / 8)
            .ok_or(FlatError::UnexpectedEnd(self.pos))?;
        let bit = (byte >> (7 - self.pos % 8)) & 1 == 1;
        self.pos += 1;
        Ok(bit)
    }

    fn bits(&mut self, count: u8) -> Result<u8, FlatError> {
        let mut value = 0u8;
        for _ in 0..count {
            value = (value << 1) | u8::from(self.bit()?);
        }
        Ok(value)
    }

    fn remaining_bytes(&self) -> usize {
        self.bytes.len() - self.pos / 8
    }

    fn filler(&mut self) -> Result<(), FlatError> {
        while !self.bit()? {}
        if self.pos % 8 != 0 {
            return Err(FlatError::InvalidFiller);
        }
        Ok(())
    }

    fn natural(&mut self) -> Result<Natural, FlatError> {
        let mut groups = Vec::new();
        loop {
            let more = self.bit()?;
            groups.push(self.bits(7)?);
            if !more {
                return Ok(Natural(groups));
            }
        }
    }

    fn bytestring(&mut self) -> Result<Vec<u8>, FlatError> {
        self.filler()?;
        let mut out = Vec::new();
        loop {
            let len = self.bits(8)?;
            if len == 0 {
                return Ok(out);
            }
            for _ in 0..len {
                out.push(self.bits(8)?);
            }
        }
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, FlatError>,
    ) -> Result<Vec<T>, FlatError> {
        let mut items = Vec::new();
        while self.bit()? {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn term(&mut self, depth: usize) -> Result<Term, FlatError> {
        if depth > MAX_TERM_DEPTH {
            return Err(FlatError::TooDeep(MAX_TERM_DEPTH));
        }
        let next = depth + 1;
        Ok(match self.bits(4)? {
            TERM_VAR => Term::Var(self.natural()?.to_u64()?),
            TERM_DELAY => Term::Delay(Box::new(self.term(next)?)),
            TERM_LAMBDA => Term::Lambda(Box::new(self.term(next)?)),
            TERM_APPLY => {
                let function = self.term(next)?;
                Term::Apply(Box::new(function), Box::new(self.term(next)?))
            }
            TERM_CONSTANT => {
                let tags = self.list(|r| r.bits(4))?;
                let ty = Type::from_tags(&tags)?;
                Term::Constant(self.constant(&ty)?)
            }
            TERM_FORCE => Term::Force(Box::new(self.term(next)?)),
            TERM_ERROR => Term::Error,
            TERM_BUILTIN => Term::Builtin(self.bits(7)?),
            TERM_CONSTR => {
                let tag = self.natural()?.to_u64()?;
                let fields = self.list(|r| r.term(next))?;
                Term::Constr { tag, fields }
            }
            TERM_CASE => {
                let scrutinee = Box::new(self.term(next)?);
                let branches = self.list(|r| r.term(next))?;
                Term::Case {
                    scrutinee,
                    branches,
                }
            }
            other => return Err(FlatError::UnknownTermTag(other)),
        })
    }

    fn constant(&mut self, ty: &Type) -> Result<Constant, FlatError> {
        Ok(match ty {
            Type::Integer => Constant::Integer(self.natural()?),
            Type::ByteString => Constant::ByteString(self.bytestring()?),
            Type::String => Constant::String(
                String::from_utf8(self.bytestring()?).map_err(|_| FlatError::InvalidUtf8)?,
            ),
            Type::Unit => Constant::Unit,
            Type::Bool => Constant::Bool(self.bit()?),
            Type::Data => Constant::Data(self.bytestring()?),
            Type::List(element) => {
                let items = self.list(|r| r.constant(element))?;
                Constant::List((**element).clone(), items)
            }
            Type::Pair(first, second) => {
                let first = self.constant(first)?;
                Constant::Pair(Box::new(first), Box::new(self.constant(second)?))
            }
        })
    }
}

// =============================================================================
// Bit writer
// =============================================================================

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    fn bit(&mut self, bit: bool) {
        self.current = (self.current << 1) | u8::from(bit);
        self.used += 1;
        if self.used == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.used = 0;
        }
    }

    fn bits(&mut self, count: u8, value: u8) {
        for i in (0..count).rev() {
            self.bit((value >> i) & 1 == 1);
        }
    }

    fn filler(&mut self) {
        while self.used != 7 {
            self.bit(false);
        }
        self.bit(true);
    }

    fn natural(&mut self, natural: &Natural) {
        let last = natural.0.len().saturating_sub(1);
        for (i, group) in natural.0.iter().enumerate() {
            self.bit(i != last);
            self.bits(7, *group);
        }
    }

    fn bytestring(&mut self, bytes: &[u8]) {
        self.filler();
        for chunk in bytes.chunks(255) {
            self.bits(8, chunk.len() as u8);
            for byte in chunk {
                self.bits(8, *byte);
            }
        }
        self.bits(8, 0);
    }

    fn terms(&mut self, terms: &[Term]) {
        for term in terms {
            self.bit(true);
            self.term(term);
        }
        self.bit(false);
    }

    fn term(&mut self, term: &Term) {
        match term {
            Term::Var(index) => {
                self.bits(4, TERM_VAR);
                self.natural(&Natural::from_u64(*index));
            }
            Term::Delay(body) => {
                self.bits(4, TERM_DELAY);
                self.term(body);
            }
            Term::Lambda(body) => {
                self.bits(4, TERM_LAMBDA);
                self.term(body);
            }
            Term::Apply(function, argument) => {
                self.bits(4, TERM_APPLY);
                self.term(function);
                self.term(argument);
            }
            Term::Constant(constant) => {
                self.bits(4, TERM_CONSTANT);
                let mut tags = Vec::new();
                constant.type_of().tags(&mut tags);
                for tag in tags {
                    self.bit(true);
                    self.bits(4, tag);
                }
                self.bit(false);
                self.constant(constant);
            }
            Term::Force(body) => {
                self.bits(4, TERM_FORCE);
                self.term(body);
            }
            Term::Error => self.bits(4, TERM_ERROR),
            Term::Builtin(id) => {
                self.bits(4, TERM_BUILTIN);
                self.bits(7, *id);
            }
            Term::Constr { tag, fields } => {
                self.bits(4, TERM_CONSTR);
                self.natural(&Natural::from_u64(*tag));
                self.terms(fields);
            }
            Term::Case {
                scrutinee,
                branches,
            } => {
                self.bits(4, TERM_CASE);
                self.term(scrutinee);
                self.terms(branches);
            }
        }
    }

    fn constant(&mut self, constant: &Constant) {
        match constant {
            Constant::Integer(n) => self.natural(n),
            Constant::ByteString(bytes) | Constant::Data(bytes) => self.bytestring(bytes),
            Constant::String(s) => self.bytestring(s.as_bytes()),
            Constant::Unit => {}
            Constant::Bool(b) => self.bit(*b),
            Constant::List(_, items) => {
                for item in items {
                    self.bit(true);
                    self.constant(item);
                }
                self.bit(false);
            }
            Constant::Pair(first, second) => {
                self.constant(first);
                self.constant(second);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `(program 1.1.0 (lam x x))`
    const IDENTITY: [u8; 6] = [0x01, 0x01, 0x00, 0x20, 0x01, 0x01];

    #[test]
    fn test_decode_identity() {
        let program = Program::from_flat(&IDENTITY).unwrap();
        assert_eq!(program.version, (1, 1, 0));
        assert_eq!(program.term, Term::Lambda(Box::new(Term::Var(1))));
        assert_eq!(program.to_flat(), IDENTITY.to_vec());
    }

    #[test]
    fn test_apply_data_layout() {
        let data = vec![0xd8, 0x79, 0x80];
        let applied = Program::from_flat(&IDENTITY).unwrap().apply_data(data.clone());

        // apply, lam, var 1, con [data], filler, one chunk, end, filler
        let mut expected = vec![0x01, 0x01, 0x00, 0x32, 0x00, 0x14, 0xc1, 0x03];
        expected.extend_from_slice(&data);
        expected.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(applied.to_flat(), expected);

        let decoded = Program::from_flat(&expected).unwrap();
        assert_eq!(
            decoded.term,
            Term::Apply(
                Box::new(Term::Lambda(Box::new(Term::Var(1)))),
                Box::new(Term::Constant(Constant::Data(data)))
            )
        );
    }

    #[test]
    fn test_constants_and_sums_survive_reencoding() {
        let program = Program {
            version: (1, 1, 0),
            term: Term::Case {
                scrutinee: Box::new(Term::Constr {
                    tag: 300,
                    fields: vec![
                        Term::Constant(Constant::integer(-129)),
                        Term::Constant(Constant::ByteString(vec![7; 600])),
                        Term::Constant(Constant::List(
                            Type::Pair(Box::new(Type::Bool), Box::new(Type::String)),
                            vec![Constant::Pair(
                                Box::new(Constant::Bool(true)),
                                Box::new(Constant::String("vault".into())),
                            )],
                        )),
                    ],
                }),
                branches: vec![
                    Term::Force(Box::new(Term::Builtin(11))),
                    Term::Delay(Box::new(Term::Constant(Constant::Unit))),
                    Term::Error,
                ],
            },
        };
        let cbor = program.to_cbor();
        assert_eq!(Program::from_cbor(&cbor).unwrap(), program);
    }

    #[test]
    fn test_malformed_programs() {
        // lambda without a body
        assert!(matches!(
            Program::from_flat(&[0x01, 0x01, 0x00, 0x20]),
            Err(FlatError::UnexpectedEnd(_))
        ));
        // filler missing its final 1
        assert!(Program::from_flat(&[0x01, 0x01, 0x00, 0x60]).is_err());
        assert!(matches!(
            Program::from_flat(&[0x01, 0x01, 0x00, 0x26, 0x01, 0x00]),
            Err(FlatError::TrailingBytes(1))
        ));
        // term tag 15
        assert!(matches!(
            Program::from_flat(&[0x01, 0x01, 0x00, 0xf0]),
            Err(FlatError::UnknownTermTag(15))
        ));
        // a CBOR bytestring followed by stray bytes
        assert_eq!(
            Program::from_cbor(&[0x58, 0x01, 0x01, 0x01, 0x00]),
            Err(FlatError::NotWrapped)
        );
    }

    #[test]
    fn test_natural_overflow() {
        let huge = Natural(vec![0x7f; 10]);
        assert_eq!(huge.to_u64(), Err(FlatError::Overflow));
        assert_eq!(Natural::from_u64(300).to_u64().unwrap(), 300);
    }
}
