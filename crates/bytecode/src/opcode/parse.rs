use super::OpCode;
use crate::opcode::NAME_TO_OPCODE;

/// Unknown opcode name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown opcode {0:?}")]
pub struct OpCodeError(pub String);

impl core::str::FromStr for OpCode {
    type Err = OpCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| OpCodeError(s.to_string()))
    }
}

impl OpCode {
    /// Looks an opcode up by name, ignoring case. The inverse of
    /// [`as_str`](Self::as_str), except that `PREVRANDAO` (resolving to
    /// `DIFFICULTY`) and the legacy `SHA3` (resolving to `KECCAK256`) also
    /// resolve.
    pub fn parse(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "PREVRANDAO" => Some(Self::DIFFICULTY),
            "SHA3" => Some(Self::KECCAK256),
            upper => NAME_TO_OPCODE.get(upper).copied(),
        }
    }
}
