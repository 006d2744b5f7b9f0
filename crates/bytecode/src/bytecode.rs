//! Assembled bytecode.

use crate::{iter::BytecodeIterator, op::Op, EncodingError};
use core::{
    fmt,
    ops::{Add, Mul},
};
use primitives::{keccak256, Bytes, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An immutable sequence of bytecode.
///
/// Built from [`Op`]s, text assembly or raw bytes and combined with `+`
/// (concatenation) and `*` (repetition). Raw bytes are taken as they are, so
/// malformed code such as a `PUSH32` with a one-byte immediate can be built on
/// purpose. Equality is byte-exact.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytecode(Bytes);

impl Bytecode {
    /// Empty bytecode.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a sequence of operations.
    pub fn assemble<I>(ops: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Op>,
    {
        let mut out = Vec::new();
        for op in ops {
            op.into().encode_into(&mut out);
        }
        Self(out.into())
    }

    /// Splices raw bytes without validating them.
    #[inline]
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parses text assembly, see [`crate::asm`].
    pub fn from_asm(source: &str) -> Result<Self, EncodingError> {
        crate::asm::parse(source)
    }

    /// Concatenation of `self` and `other`.
    pub fn concat(&self, other: &Bytecode) -> Self {
        let mut out = Vec::with_capacity(self.len() + other.len());
        out.extend_from_slice(&self.0);
        out.extend_from_slice(&other.0);
        Self(out.into())
    }

    /// `n` copies of `self`.
    pub fn repeat(&self, n: usize) -> Self {
        Self(self.0.repeat(n).into())
    }

    /// Byte length.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for empty code.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw bytes.
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Raw bytes as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Consumes `self` into its bytes.
    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Keccak-256 code hash.
    pub fn hash(&self) -> B256 {
        keccak256(&self.0)
    }

    /// Iterates over instructions, skipping immediates.
    #[inline]
    pub fn iter_opcodes(&self) -> BytecodeIterator<'_> {
        BytecodeIterator::new(self.as_slice())
    }

    /// Disassembly in the text assembly syntax. Undefined bytes are printed as
    /// raw `0x..` literals.
    pub fn to_asm(&self) -> String {
        self.iter_opcodes()
            .map(|ins| ins.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Op> for Bytecode {
    fn from(op: Op) -> Self {
        Self::assemble([op])
    }
}

impl From<Bytes> for Bytecode {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Bytecode> for Bytes {
    fn from(code: Bytecode) -> Self {
        code.0
    }
}

impl FromIterator<Op> for Bytecode {
    fn from_iter<I: IntoIterator<Item = Op>>(iter: I) -> Self {
        Self::assemble(iter)
    }
}

impl AsRef<[u8]> for Bytecode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Add for Bytecode {
    type Output = Bytecode;

    fn add(self, rhs: Bytecode) -> Bytecode {
        self.concat(&rhs)
    }
}

impl Add<Op> for Bytecode {
    type Output = Bytecode;

    fn add(self, rhs: Op) -> Bytecode {
        self.concat(&Bytecode::from(rhs))
    }
}

impl Add<Bytecode> for Op {
    type Output = Bytecode;

    fn add(self, rhs: Bytecode) -> Bytecode {
        Bytecode::from(self).concat(&rhs)
    }
}

impl Add for Op {
    type Output = Bytecode;

    fn add(self, rhs: Op) -> Bytecode {
        Bytecode::assemble([self, rhs])
    }
}

impl Mul<usize> for Bytecode {
    type Output = Bytecode;

    fn mul(self, n: usize) -> Bytecode {
        self.repeat(n)
    }
}

impl fmt::Debug for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytecode({})", self.to_asm())
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Bytecode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bytecode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Bytes::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    #[test]
    fn length_is_sum_of_encoded_ops() {
        let ops = [
            OpCode::PUSH1.with(1u64).unwrap(),
            OpCode::PUSH32.with(2u64).unwrap(),
            Op::new(OpCode::ADD),
            Op::new(OpCode::STOP),
        ];
        let expected: usize = ops
            .iter()
            .map(|op| 1 + op.opcode().immediate_size() as usize)
            .sum();
        let code = Bytecode::assemble(ops);
        assert_eq!(code.len(), expected);
        assert_eq!(code.len(), 2 + 33 + 1 + 1);
    }

    #[test]
    fn concat_and_repeat() {
        let a = Bytecode::from(Op::push(1u64));
        let b = Bytecode::from(Op::new(OpCode::POP));
        let ab = a.clone() + b.clone();
        assert_eq!(ab.as_slice(), &[0x60, 0x01, 0x50]);
        assert_eq!((ab.clone() * 3).len(), 9);
        assert_eq!(ab.repeat(0), Bytecode::new());
        assert_eq!(Op::new(OpCode::JUMPDEST) * 2, Bytecode::raw(vec![0x5b, 0x5b]));
    }

    #[test]
    fn raw_splice_skips_validation() {
        // PUSH32 followed by a single byte of immediate.
        let code = Bytecode::from(Op::new(OpCode::STOP)) + Bytecode::raw(vec![0x7f, 0x01]);
        assert_eq!(code.as_slice(), &[0x00, 0x7f, 0x01]);
        assert_eq!(code.to_asm(), "STOP PUSH32 0x01");
    }

    #[test]
    fn serde_as_hex() {
        let code = Op::push(0x2au64) + Op::new(OpCode::STOP);
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"0x602a00\"");
        assert_eq!(serde_json::from_str::<Bytecode>(&json).unwrap(), code);
    }

    #[test]
    fn equality_is_byte_exact() {
        let a = Op::push(1u64) + Op::new(OpCode::STOP);
        let b = Bytecode::raw(vec![0x60, 0x01, 0x00]);
        assert_eq!(a, b);
        assert_ne!(a, Bytecode::raw(vec![0x61, 0x00, 0x01, 0x00]));
    }
}
