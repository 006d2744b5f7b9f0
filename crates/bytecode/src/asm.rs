//! Text assembly.
//!
//! Instructions are separated by whitespace, `;` or `,`; `//` starts a
//! comment that runs to the end of the line. An opcode with an immediate is
//! followed by its operand as a `0x` hex or decimal literal:
//!
//! ```text
//! PUSH1 0x01 ; PUSH1 0 ; SSTORE   // slot 0 = 1
//! ```
//!
//! A hex literal where no operand is expected is spliced in as raw bytes,
//! which is how malformed code is written in text form.

use crate::{op::Op, opcode::OpCode, Bytecode, EncodingError};
use primitives::{hex, U256};

/// Parses `source` into bytecode.
pub fn parse(source: &str) -> Result<Bytecode, EncodingError> {
    let mut out = Bytecode::new();
    let mut tokens = tokenize(source).peekable();

    while let Some(token) = tokens.next() {
        if let Some(digits) = token.strip_prefix("0x") {
            out = out + Bytecode::raw(decode_hex(digits, token)?);
            continue;
        }

        let opcode = OpCode::parse(token)
            .ok_or_else(|| EncodingError::UnknownMnemonic(token.to_string()))?;
        if opcode.immediate_size() == 0 {
            out = out + Op::new(opcode);
            continue;
        }

        let operand = match tokens.next_if(|t| is_literal(t)) {
            Some(operand) => operand,
            None => return Err(EncodingError::MissingOperand(opcode)),
        };
        let op = match operand.strip_prefix("0x") {
            Some(digits) => opcode.with_bytes(&decode_hex(digits, operand)?)?,
            None => opcode.with(
                U256::from_str_radix(operand, 10)
                    .map_err(|_| EncodingError::InvalidLiteral(operand.to_string()))?,
            )?,
        };
        out = out + op;
    }

    Ok(out)
}

fn tokenize(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ';' || c == ','))
        .filter(|t| !t.is_empty())
}

fn is_literal(token: &str) -> bool {
    token.starts_with("0x") || token.bytes().all(|b| b.is_ascii_digit())
}

fn decode_hex(digits: &str, token: &str) -> Result<Vec<u8>, EncodingError> {
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|_| EncodingError::InvalidLiteral(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_program() {
        let code = parse("PUSH1 0x01; PUSH1 0; SSTORE").unwrap();
        assert_eq!(code.as_slice(), &[0x60, 0x01, 0x60, 0x00, 0x55]);
    }

    #[test]
    fn comments_and_case() {
        let code = parse(
            "push2 0x1234 // a comment\n\
             callvalue, sstore\n\
             stop",
        )
        .unwrap();
        assert_eq!(code.as_slice(), &[0x61, 0x12, 0x34, 0x34, 0x55, 0x00]);
    }

    #[test]
    fn raw_literals_are_spliced() {
        let code = parse("STOP 0x7f01").unwrap();
        assert_eq!(code.as_slice(), &[0x00, 0x7f, 0x01]);
    }

    #[test]
    fn errors() {
        assert_eq!(
            parse("PUSH1 0x0100"),
            Err(EncodingError::OperandOverflow {
                opcode: OpCode::PUSH1,
                width: 1,
                len: 2
            })
        );
        assert_eq!(
            parse("PUSH1 ADD"),
            Err(EncodingError::MissingOperand(OpCode::PUSH1))
        );
        assert_eq!(
            parse("FOO"),
            Err(EncodingError::UnknownMnemonic("FOO".to_string()))
        );
        assert_eq!(
            parse("0xzz"),
            Err(EncodingError::InvalidLiteral("0xzz".to_string()))
        );
    }

    #[test]
    fn disassembly_round_trip() {
        let source = "PUSH1 0x2a PUSH1 0x00 SSTORE STOP";
        assert_eq!(parse(source).unwrap().to_asm(), source);
    }
}
