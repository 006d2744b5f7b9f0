//! Bytecode assembler and opcode table.
//!
//! Code is built from [`Op`]s (an [`OpCode`] plus its encoded immediate),
//! from text assembly, or from raw bytes, and combined with `+` and `*`:
//!
//! ```ignore
//! use bytecode::{bytecode, opcode::OpCode, Bytecode, Op};
//!
//! let store = bytecode! { PUSH1(0x01) PUSH1(0x00) SSTORE };
//! let code = store * 2 + Op::new(OpCode::STOP);
//! assert_eq!(code, Bytecode::from_asm("PUSH1 1 PUSH1 0 SSTORE PUSH1 1 PUSH1 0 SSTORE STOP")?);
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod asm;
pub mod bytecode;
mod iter;
mod op;
pub mod opcode;

pub use bytecode::Bytecode;
pub use iter::{BytecodeIterator, Instruction};
pub use op::{EncodingError, Op};
pub use opcode::{GasTier, OpCode, OpCodeInfo};

/// Assembles bytecode from opcode names.
///
/// Opcodes with an immediate take their operand in parentheses. Panics if an
/// operand does not fit, which makes it suitable for statically known code;
/// use [`OpCode::with`] to handle the error instead.
///
/// ```ignore
/// let code = bytecode! {
///     PUSH1(0x01)
///     PUSH1(0x00)
///     SSTORE
///     STOP
/// };
/// ```
#[macro_export]
macro_rules! bytecode {
    ($($args:tt)*) => {{
        let mut code = $crate::Bytecode::default();
        $crate::bytecode_internal!(code, $($args)*);
        code
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! bytecode_internal {
    ($code:ident, ) => {};
    ($code:ident, $x:ident ($v:expr) $($rest:tt)*) => {{
        let op = match $crate::OpCode::$x.with($v) {
            Ok(op) => op,
            Err(err) => panic!("{}", err),
        };
        $code = $code + op;
        $crate::bytecode_internal!($code, $($rest)*);
    }};
    ($code:ident, $x:ident $($rest:tt)*) => {{
        $code = $code + $crate::Op::new($crate::OpCode::$x);
        $crate::bytecode_internal!($code, $($rest)*);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_matches_text_assembly() {
        let code = bytecode! {
            PUSH8(0x123)
            POP
            PUSH1(0x01)
            PUSH1(0x00)
            SSTORE
            STOP
        };
        assert_eq!(
            code,
            Bytecode::from_asm("PUSH8 0x123 POP PUSH1 1 PUSH1 0 SSTORE STOP").unwrap()
        );
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn macro_panics_on_overflow() {
        let _ = bytecode! { PUSH1(0x100) };
    }
}
