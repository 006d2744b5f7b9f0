use crate::opcode::{self, OpCode};
use core::fmt;

/// One decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// Offset of the opcode byte.
    pub pc: usize,
    /// Opcode byte, which may be undefined.
    pub opcode: u8,
    /// Immediate bytes. Shorter than the declared width when the code ends
    /// in the middle of an immediate.
    pub immediate: &'a [u8],
}

impl Instruction<'_> {
    /// The opcode if it is defined.
    pub fn op(&self) -> Option<OpCode> {
        OpCode::new(self.opcode)
    }

    /// Returns `true` if the immediate was cut off by the end of the code.
    pub fn is_truncated(&self) -> bool {
        self.op()
            .is_some_and(|op| self.immediate.len() < op.immediate_size() as usize)
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Some(op) => {
                f.write_str(op.as_str())?;
                if !self.immediate.is_empty() {
                    write!(f, " 0x{}", primitives::hex::encode(self.immediate))?;
                }
                Ok(())
            }
            None => write!(f, "0x{:02x}", self.opcode),
        }
    }
}

/// Iterator over the instructions in a bytecode, skipping immediates.
#[derive(Debug, Clone)]
pub struct BytecodeIterator<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeIterator<'a> {
    /// Creates a new iterator over raw code.
    #[inline]
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    /// Returns the current position in the bytecode.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the current opcode without advancing the iterator.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.code.get(self.pos).copied()
    }
}

impl<'a> Iterator for BytecodeIterator<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let pc = self.pos;
        let opcode = *self.code.get(pc)?;
        let size = opcode::OPCODE_INFO[opcode as usize]
            .map(|info| info.immediate_size() as usize)
            .unwrap_or_default();
        let end = (pc + 1 + size).min(self.code.len());
        self.pos = end;
        Some(Instruction {
            pc,
            opcode,
            immediate: &self.code[pc + 1..end],
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let byte_len = self.code.len() - self.pos;
        (byte_len.min(1), Some(byte_len))
    }
}

impl core::iter::FusedIterator for BytecodeIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{ADD, PUSH1, PUSH2, STOP};

    #[test]
    fn test_simple_bytecode_iteration() {
        let code = [PUSH1, 0x01, PUSH1, 0x02, ADD, STOP];
        let opcodes: Vec<u8> = BytecodeIterator::new(&code).map(|i| i.opcode).collect();
        assert_eq!(opcodes, vec![PUSH1, PUSH1, ADD, STOP]);
    }

    #[test]
    fn test_truncated_immediate() {
        let code = [ADD, PUSH2, 0x01];
        let instructions: Vec<_> = BytecodeIterator::new(&code).collect();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].pc, 1);
        assert_eq!(instructions[1].immediate, &[0x01]);
        assert!(instructions[1].is_truncated());
    }

    #[test]
    fn test_undefined_bytes() {
        let code = [0x0c, STOP];
        let instructions: Vec<_> = BytecodeIterator::new(&code).collect();
        assert_eq!(instructions[0].op(), None);
        assert_eq!(instructions[0].to_string(), "0x0c");
        assert_eq!(instructions[1].to_string(), "STOP");
    }
}
