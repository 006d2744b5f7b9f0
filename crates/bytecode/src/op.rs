use crate::{opcode::OpCode, Bytecode};
use core::{fmt, ops::Mul};
use primitives::{HexCodec, UintTryFrom, U256};

/// Errors raised while assembling bytecode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Operand does not fit the opcode's immediate width.
    #[error("operand of {len} bytes does not fit the {width}-byte immediate of {opcode}")]
    OperandOverflow {
        /// Opcode receiving the operand.
        opcode: OpCode,
        /// Declared immediate width.
        width: u8,
        /// Minimal byte length of the operand.
        len: usize,
    },
    /// Operand given to an opcode without an immediate.
    #[error("{0} takes no immediate operand")]
    UnexpectedOperand(OpCode),
    /// Opcode with an immediate is missing its operand.
    #[error("{0} requires an immediate operand")]
    MissingOperand(OpCode),
    /// Unknown opcode name in text assembly.
    #[error("unknown mnemonic {0:?}")]
    UnknownMnemonic(String),
    /// Malformed literal in text assembly.
    #[error("invalid literal {0:?}")]
    InvalidLiteral(String),
}

/// One symbolic operation: an opcode and its encoded immediate.
///
/// The immediate always has exactly the opcode's declared width, so the
/// encoded length of an `Op` is `1 + immediate_size`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Op {
    opcode: OpCode,
    immediate: Vec<u8>,
}

impl Op {
    /// Operation without an explicit operand. Immediates, if the opcode has
    /// any, are zero-filled.
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            immediate: vec![0; opcode.immediate_size() as usize],
        }
    }

    /// `PUSHn value` with the smallest `n` that holds `value`.
    ///
    /// Zero is encoded as `PUSH1 0x00`; `PUSH0` is only emitted when asked for
    /// explicitly since it does not exist before Shanghai.
    pub fn push<T>(value: T) -> Self
    where
        U256: UintTryFrom<T>,
    {
        let raw = U256::from(value).to_raw();
        // `to_raw` is 1..=32 bytes, always a valid PUSH width.
        let opcode = OpCode::push_n(raw.len() as u8).unwrap_or(OpCode::PUSH32);
        Self {
            opcode,
            immediate: raw,
        }
    }

    /// The opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// The encoded immediate.
    pub fn immediate(&self) -> &[u8] {
        &self.immediate
    }

    /// Encoded length.
    pub fn len(&self) -> usize {
        1 + self.immediate.len()
    }

    /// Always `false`, an operation encodes to at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode.get());
        out.extend_from_slice(&self.immediate);
    }
}

impl OpCode {
    /// Attaches an integer operand, big-endian and zero-padded to the
    /// immediate width.
    pub fn with<T>(self, operand: T) -> Result<Op, EncodingError>
    where
        U256: UintTryFrom<T>,
    {
        self.with_bytes(&U256::from(operand).to_raw())
    }

    /// Attaches a big-endian byte operand. Leading zero bytes beyond the
    /// immediate width are ignored, anything else that does not fit is an
    /// [`EncodingError::OperandOverflow`].
    pub fn with_bytes(self, operand: &[u8]) -> Result<Op, EncodingError> {
        let width = self.immediate_size();
        if width == 0 {
            return Err(EncodingError::UnexpectedOperand(self));
        }
        let first = operand
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(operand.len());
        let significant = &operand[first..];
        if significant.len() > width as usize {
            return Err(EncodingError::OperandOverflow {
                opcode: self,
                width,
                len: significant.len(),
            });
        }
        let mut immediate = vec![0; width as usize];
        immediate[width as usize - significant.len()..].copy_from_slice(significant);
        Ok(Op {
            opcode: self,
            immediate,
        })
    }
}

impl From<OpCode> for Op {
    fn from(opcode: OpCode) -> Self {
        Op::new(opcode)
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.as_str())?;
        if !self.immediate.is_empty() {
            write!(f, " 0x{}", primitives::hex::encode(&self.immediate))?;
        }
        Ok(())
    }
}

impl Mul<usize> for Op {
    type Output = Bytecode;

    fn mul(self, n: usize) -> Bytecode {
        Bytecode::from(self).repeat(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0u64, &[0x60, 0x00])]
    #[case::one_byte(0xffu64, &[0x60, 0xff])]
    #[case::two_bytes(0x100u64, &[0x61, 0x01, 0x00])]
    #[case::eight_bytes(u64::MAX, &[0x67, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])]
    fn push_picks_smallest_width(#[case] value: u64, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        Op::push(value).encode_into(&mut out);
        assert_eq!(out, expected);
    }

    #[test]
    fn operand_is_zero_padded() {
        let op = OpCode::PUSH4.with(1u64).unwrap();
        assert_eq!(op.immediate(), &[0, 0, 0, 1]);
        assert_eq!(op.len(), 5);
        assert_eq!(op.to_string(), "PUSH4 0x00000001");
    }

    #[test]
    fn operand_overflow_is_an_error() {
        assert_eq!(
            OpCode::PUSH1.with(0x100u64),
            Err(EncodingError::OperandOverflow {
                opcode: OpCode::PUSH1,
                width: 1,
                len: 2
            })
        );
        assert!(OpCode::PUSH32.with(U256::MAX).is_ok());
        assert!(OpCode::PUSH2.with_bytes(&[0, 0, 0, 0xab]).is_ok());
    }

    #[test]
    fn operand_on_plain_opcode() {
        assert_eq!(
            OpCode::ADD.with(1u64),
            Err(EncodingError::UnexpectedOperand(OpCode::ADD))
        );
    }

    #[test]
    fn new_zero_fills_immediate() {
        assert_eq!(Op::new(OpCode::PUSH2).immediate(), &[0, 0]);
        assert!(Op::new(OpCode::STOP).immediate().is_empty());
    }
}
