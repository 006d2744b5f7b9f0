//! Opcode table.
//!
//! One row per opcode defined by any fork: numeric value, name, stack arity,
//! immediate width, gas tier and the fork that introduced it. Which opcodes a
//! given fork actually enables, and what each tier costs there, is decided by
//! the fork registry.

mod parse;

pub use parse::OpCodeError;

use core::fmt;
use primitives::hardfork::ForkId::{self, *};
use GasTier::*;

/// Gas cost category of an opcode.
///
/// The fixed tiers have the same cost in every fork. The named tiers are
/// priced by the fork's gas schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GasTier {
    /// 0 gas.
    Zero,
    /// 2 gas.
    Base,
    /// 3 gas.
    VeryLow,
    /// 5 gas.
    Low,
    /// 8 gas.
    Mid,
    /// 10 gas.
    High,
    /// `JUMPDEST`.
    JumpDest,
    /// `EXP` static part.
    Exp,
    /// `KECCAK256` static part.
    Keccak,
    /// `BALANCE`.
    Balance,
    /// `EXTCODESIZE` and `EXTCODECOPY`.
    ExtCode,
    /// `EXTCODEHASH`.
    ExtCodeHash,
    /// `SLOAD`.
    SLoad,
    /// `SSTORE` lower bound.
    SStore,
    /// Transient storage access.
    WarmAccess,
    /// Message calls.
    Call,
    /// Contract creation.
    Create,
    /// `LOGn` static part.
    Log,
    /// `BLOCKHASH`.
    BlockHash,
    /// `SELFDESTRUCT`.
    SelfDestruct,
}

/// A defined opcode.
///
/// This is always a value present in [`OPCODE_INFO`]; whether a given fork
/// enables it is a separate question.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct OpCode(u8);

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OpCode {
    /// Instantiates an opcode from a byte, `None` when the byte is not defined
    /// in any fork.
    #[inline]
    pub const fn new(opcode: u8) -> Option<Self> {
        match OPCODE_INFO[opcode as usize] {
            Some(_) => Some(Self(opcode)),
            None => None,
        }
    }

    /// Returns the opcode as a u8.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the opcode information.
    #[inline]
    pub const fn info(&self) -> OpCodeInfo {
        match OPCODE_INFO[self.0 as usize] {
            Some(info) => info,
            None => panic!("opcode not found"),
        }
    }

    /// Returns the opcode name.
    #[doc(alias = "name")]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        self.info().name()
    }

    /// Returns the name of `opcode`, or `"UNKNOWN"` if it is not defined.
    #[inline]
    pub const fn name_by_op(opcode: u8) -> &'static str {
        match Self::new(opcode) {
            Some(op) => op.as_str(),
            None => "UNKNOWN",
        }
    }

    /// Returns the number of input stack elements.
    #[inline]
    pub const fn inputs(&self) -> u8 {
        self.info().inputs()
    }

    /// Returns the number of output stack elements.
    #[inline]
    pub const fn outputs(&self) -> u8 {
        self.info().outputs()
    }

    /// Size in bytes of the immediate operand.
    #[inline]
    pub const fn immediate_size(&self) -> u8 {
        self.info().immediate_size()
    }

    /// Returns true if the opcode is a `PUSH1..=PUSH32` instruction.
    #[inline]
    pub const fn is_push(self) -> bool {
        self.0 >= PUSH1 && self.0 <= PUSH32
    }

    /// The `PUSHn` opcode with an `n`-byte immediate. `n` must be in `1..=32`.
    #[inline]
    pub const fn push_n(n: u8) -> Option<Self> {
        if n >= 1 && n <= 32 {
            Some(Self(PUSH1 + n - 1))
        } else {
            None
        }
    }
}

/// Information about an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpCodeInfo {
    name: &'static str,
    inputs: u8,
    outputs: u8,
    immediate_size: u8,
    terminating: bool,
    tier: GasTier,
    since: ForkId,
}

impl OpCodeInfo {
    /// Creates a new opcode info with the given name and default values.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            inputs: 0,
            outputs: 0,
            immediate_size: 0,
            terminating: false,
            tier: Zero,
            since: FRONTIER,
        }
    }

    /// Returns the opcode name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of input stack elements.
    #[inline]
    pub const fn inputs(&self) -> u8 {
        self.inputs
    }

    /// Returns the number of output stack elements.
    #[inline]
    pub const fn outputs(&self) -> u8 {
        self.outputs
    }

    /// Calculates the difference between the number of input and output stack elements.
    #[inline]
    pub const fn io_diff(&self) -> i16 {
        self.outputs as i16 - self.inputs as i16
    }

    /// Returns the size of the immediate value in bytes.
    #[inline]
    pub const fn immediate_size(&self) -> u8 {
        self.immediate_size
    }

    /// Returns whether this opcode halts execution.
    #[inline]
    pub const fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Gas cost category.
    #[inline]
    pub const fn gas_tier(&self) -> GasTier {
        self.tier
    }

    /// Fork that introduced the opcode.
    #[inline]
    pub const fn since(&self) -> ForkId {
        self.since
    }
}

/// Sets the immediate bytes number.
#[inline]
pub const fn immediate_size(mut op: OpCodeInfo, n: u8) -> OpCodeInfo {
    op.immediate_size = n;
    op
}

/// Sets the terminating flag to true.
#[inline]
pub const fn terminating(mut op: OpCodeInfo) -> OpCodeInfo {
    op.terminating = true;
    op
}

/// Sets the number of stack inputs and outputs.
#[inline]
pub const fn stack_io(mut op: OpCodeInfo, inputs: u8, outputs: u8) -> OpCodeInfo {
    op.inputs = inputs;
    op.outputs = outputs;
    op
}

/// Sets the gas tier.
#[inline]
pub const fn gas(mut op: OpCodeInfo, tier: GasTier) -> OpCodeInfo {
    op.tier = tier;
    op
}

/// Sets the introducing fork.
#[inline]
pub const fn since(mut op: OpCodeInfo, fork: ForkId) -> OpCodeInfo {
    op.since = fork;
    op
}

/// Alias for [`JUMPDEST`].
pub const NOP: u8 = JUMPDEST;

/// Name of [`DIFFICULTY`] from Paris on.
pub const PREVRANDAO: u8 = DIFFICULTY;

/// Alias for [`KECCAK256`].
pub const SHA3: u8 = KECCAK256;

/// Callback for creating a [`phf`] map with `stringify_with_cb`.
macro_rules! phf_map_cb {
    ($(#[doc = $s:literal] $id:ident)*) => {
        phf::phf_map! {
            $($s => OpCode::$id),*
        }
    };
}

/// Stringifies identifiers with `paste` so that they are available as literals.
/// This doesn't work with `stringify!` because it cannot be expanded inside of another macro.
macro_rules! stringify_with_cb {
    ($callback:ident; $($id:ident)*) => { paste::paste! {
        $callback! { $(#[doc = "" $id ""] $id)* }
    }};
}

macro_rules! opcodes {
    ($($val:literal => $name:ident => $($modifier:ident $(( $($modifier_arg:expr),* ))?),*);* $(;)?) => {
        $(
            #[doc = concat!("The `", stringify!($val), "` (\"", stringify!($name),"\") opcode.")]
            pub const $name: u8 = $val;
        )*
        impl OpCode {$(
            #[doc = concat!("The `", stringify!($val), "` (\"", stringify!($name),"\") opcode.")]
            pub const $name: Self = Self($val);
        )*}

        /// Maps each opcode to its info.
        pub const OPCODE_INFO: [Option<OpCodeInfo>; 256] = {
            let mut map = [None; 256];
            let mut prev: u8 = 0;
            $(
                let val: u8 = $val;
                assert!(val == 0 || val > prev, "opcodes must be sorted in ascending order");
                prev = val;
                let info = OpCodeInfo::new(stringify!($name));
                $(
                let info = $modifier(info, $($($modifier_arg),*)?);
                )*
                map[$val] = Some(info);
            )*
            let _ = prev;
            map
        };

        /// Maps each name to its opcode.
        static NAME_TO_OPCODE: phf::Map<&'static str, OpCode> = stringify_with_cb! { phf_map_cb; $($name)* };
    };
}

opcodes! {
    0x00 => STOP => stack_io(0, 0), terminating;

    0x01 => ADD        => stack_io(2, 1), gas(VeryLow);
    0x02 => MUL        => stack_io(2, 1), gas(Low);
    0x03 => SUB        => stack_io(2, 1), gas(VeryLow);
    0x04 => DIV        => stack_io(2, 1), gas(Low);
    0x05 => SDIV       => stack_io(2, 1), gas(Low);
    0x06 => MOD        => stack_io(2, 1), gas(Low);
    0x07 => SMOD       => stack_io(2, 1), gas(Low);
    0x08 => ADDMOD     => stack_io(3, 1), gas(Mid);
    0x09 => MULMOD     => stack_io(3, 1), gas(Mid);
    0x0A => EXP        => stack_io(2, 1), gas(Exp);
    0x0B => SIGNEXTEND => stack_io(2, 1), gas(Low);

    0x10 => LT     => stack_io(2, 1), gas(VeryLow);
    0x11 => GT     => stack_io(2, 1), gas(VeryLow);
    0x12 => SLT    => stack_io(2, 1), gas(VeryLow);
    0x13 => SGT    => stack_io(2, 1), gas(VeryLow);
    0x14 => EQ     => stack_io(2, 1), gas(VeryLow);
    0x15 => ISZERO => stack_io(1, 1), gas(VeryLow);
    0x16 => AND    => stack_io(2, 1), gas(VeryLow);
    0x17 => OR     => stack_io(2, 1), gas(VeryLow);
    0x18 => XOR    => stack_io(2, 1), gas(VeryLow);
    0x19 => NOT    => stack_io(1, 1), gas(VeryLow);
    0x1A => BYTE   => stack_io(2, 1), gas(VeryLow);
    0x1B => SHL    => stack_io(2, 1), gas(VeryLow), since(CONSTANTINOPLE);
    0x1C => SHR    => stack_io(2, 1), gas(VeryLow), since(CONSTANTINOPLE);
    0x1D => SAR    => stack_io(2, 1), gas(VeryLow), since(CONSTANTINOPLE);
    0x1E => CLZ    => stack_io(1, 1), gas(Low), since(OSAKA);

    0x20 => KECCAK256 => stack_io(2, 1), gas(Keccak);

    0x30 => ADDRESS        => stack_io(0, 1), gas(Base);
    0x31 => BALANCE        => stack_io(1, 1), gas(Balance);
    0x32 => ORIGIN         => stack_io(0, 1), gas(Base);
    0x33 => CALLER         => stack_io(0, 1), gas(Base);
    0x34 => CALLVALUE      => stack_io(0, 1), gas(Base);
    0x35 => CALLDATALOAD   => stack_io(1, 1), gas(VeryLow);
    0x36 => CALLDATASIZE   => stack_io(0, 1), gas(Base);
    0x37 => CALLDATACOPY   => stack_io(3, 0), gas(VeryLow);
    0x38 => CODESIZE       => stack_io(0, 1), gas(Base);
    0x39 => CODECOPY       => stack_io(3, 0), gas(VeryLow);
    0x3A => GASPRICE       => stack_io(0, 1), gas(Base);
    0x3B => EXTCODESIZE    => stack_io(1, 1), gas(ExtCode);
    0x3C => EXTCODECOPY    => stack_io(4, 0), gas(ExtCode);
    0x3D => RETURNDATASIZE => stack_io(0, 1), gas(Base), since(BYZANTIUM);
    0x3E => RETURNDATACOPY => stack_io(3, 0), gas(VeryLow), since(BYZANTIUM);
    0x3F => EXTCODEHASH    => stack_io(1, 1), gas(ExtCodeHash), since(CONSTANTINOPLE);
    0x40 => BLOCKHASH      => stack_io(1, 1), gas(BlockHash);
    0x41 => COINBASE       => stack_io(0, 1), gas(Base);
    0x42 => TIMESTAMP      => stack_io(0, 1), gas(Base);
    0x43 => NUMBER         => stack_io(0, 1), gas(Base);
    0x44 => DIFFICULTY     => stack_io(0, 1), gas(Base);
    0x45 => GASLIMIT       => stack_io(0, 1), gas(Base);
    0x46 => CHAINID        => stack_io(0, 1), gas(Base), since(ISTANBUL);
    0x47 => SELFBALANCE    => stack_io(0, 1), gas(Low), since(ISTANBUL);
    0x48 => BASEFEE        => stack_io(0, 1), gas(Base), since(LONDON);
    0x49 => BLOBHASH       => stack_io(1, 1), gas(VeryLow), since(CANCUN);
    0x4A => BLOBBASEFEE    => stack_io(0, 1), gas(Base), since(CANCUN);

    0x50 => POP      => stack_io(1, 0), gas(Base);
    0x51 => MLOAD    => stack_io(1, 1), gas(VeryLow);
    0x52 => MSTORE   => stack_io(2, 0), gas(VeryLow);
    0x53 => MSTORE8  => stack_io(2, 0), gas(VeryLow);
    0x54 => SLOAD    => stack_io(1, 1), gas(SLoad);
    0x55 => SSTORE   => stack_io(2, 0), gas(SStore);
    0x56 => JUMP     => stack_io(1, 0), gas(Mid);
    0x57 => JUMPI    => stack_io(2, 0), gas(High);
    0x58 => PC       => stack_io(0, 1), gas(Base);
    0x59 => MSIZE    => stack_io(0, 1), gas(Base);
    0x5A => GAS      => stack_io(0, 1), gas(Base);
    0x5B => JUMPDEST => stack_io(0, 0), gas(JumpDest);
    0x5C => TLOAD    => stack_io(1, 1), gas(WarmAccess), since(CANCUN);
    0x5D => TSTORE   => stack_io(2, 0), gas(WarmAccess), since(CANCUN);
    0x5E => MCOPY    => stack_io(3, 0), gas(VeryLow), since(CANCUN);

    0x5F => PUSH0  => stack_io(0, 1), gas(Base), since(SHANGHAI);
    0x60 => PUSH1  => stack_io(0, 1), gas(VeryLow), immediate_size(1);
    0x61 => PUSH2  => stack_io(0, 1), gas(VeryLow), immediate_size(2);
    0x62 => PUSH3  => stack_io(0, 1), gas(VeryLow), immediate_size(3);
    0x63 => PUSH4  => stack_io(0, 1), gas(VeryLow), immediate_size(4);
    0x64 => PUSH5  => stack_io(0, 1), gas(VeryLow), immediate_size(5);
    0x65 => PUSH6  => stack_io(0, 1), gas(VeryLow), immediate_size(6);
    0x66 => PUSH7  => stack_io(0, 1), gas(VeryLow), immediate_size(7);
    0x67 => PUSH8  => stack_io(0, 1), gas(VeryLow), immediate_size(8);
    0x68 => PUSH9  => stack_io(0, 1), gas(VeryLow), immediate_size(9);
    0x69 => PUSH10 => stack_io(0, 1), gas(VeryLow), immediate_size(10);
    0x6A => PUSH11 => stack_io(0, 1), gas(VeryLow), immediate_size(11);
    0x6B => PUSH12 => stack_io(0, 1), gas(VeryLow), immediate_size(12);
    0x6C => PUSH13 => stack_io(0, 1), gas(VeryLow), immediate_size(13);
    0x6D => PUSH14 => stack_io(0, 1), gas(VeryLow), immediate_size(14);
    0x6E => PUSH15 => stack_io(0, 1), gas(VeryLow), immediate_size(15);
    0x6F => PUSH16 => stack_io(0, 1), gas(VeryLow), immediate_size(16);
    0x70 => PUSH17 => stack_io(0, 1), gas(VeryLow), immediate_size(17);
    0x71 => PUSH18 => stack_io(0, 1), gas(VeryLow), immediate_size(18);
    0x72 => PUSH19 => stack_io(0, 1), gas(VeryLow), immediate_size(19);
    0x73 => PUSH20 => stack_io(0, 1), gas(VeryLow), immediate_size(20);
    0x74 => PUSH21 => stack_io(0, 1), gas(VeryLow), immediate_size(21);
    0x75 => PUSH22 => stack_io(0, 1), gas(VeryLow), immediate_size(22);
    0x76 => PUSH23 => stack_io(0, 1), gas(VeryLow), immediate_size(23);
    0x77 => PUSH24 => stack_io(0, 1), gas(VeryLow), immediate_size(24);
    0x78 => PUSH25 => stack_io(0, 1), gas(VeryLow), immediate_size(25);
    0x79 => PUSH26 => stack_io(0, 1), gas(VeryLow), immediate_size(26);
    0x7A => PUSH27 => stack_io(0, 1), gas(VeryLow), immediate_size(27);
    0x7B => PUSH28 => stack_io(0, 1), gas(VeryLow), immediate_size(28);
    0x7C => PUSH29 => stack_io(0, 1), gas(VeryLow), immediate_size(29);
    0x7D => PUSH30 => stack_io(0, 1), gas(VeryLow), immediate_size(30);
    0x7E => PUSH31 => stack_io(0, 1), gas(VeryLow), immediate_size(31);
    0x7F => PUSH32 => stack_io(0, 1), gas(VeryLow), immediate_size(32);

    0x80 => DUP1  => stack_io(1, 2), gas(VeryLow);
    0x81 => DUP2  => stack_io(2, 3), gas(VeryLow);
    0x82 => DUP3  => stack_io(3, 4), gas(VeryLow);
    0x83 => DUP4  => stack_io(4, 5), gas(VeryLow);
    0x84 => DUP5  => stack_io(5, 6), gas(VeryLow);
    0x85 => DUP6  => stack_io(6, 7), gas(VeryLow);
    0x86 => DUP7  => stack_io(7, 8), gas(VeryLow);
    0x87 => DUP8  => stack_io(8, 9), gas(VeryLow);
    0x88 => DUP9  => stack_io(9, 10), gas(VeryLow);
    0x89 => DUP10 => stack_io(10, 11), gas(VeryLow);
    0x8A => DUP11 => stack_io(11, 12), gas(VeryLow);
    0x8B => DUP12 => stack_io(12, 13), gas(VeryLow);
    0x8C => DUP13 => stack_io(13, 14), gas(VeryLow);
    0x8D => DUP14 => stack_io(14, 15), gas(VeryLow);
    0x8E => DUP15 => stack_io(15, 16), gas(VeryLow);
    0x8F => DUP16 => stack_io(16, 17), gas(VeryLow);

    0x90 => SWAP1  => stack_io(2, 2), gas(VeryLow);
    0x91 => SWAP2  => stack_io(3, 3), gas(VeryLow);
    0x92 => SWAP3  => stack_io(4, 4), gas(VeryLow);
    0x93 => SWAP4  => stack_io(5, 5), gas(VeryLow);
    0x94 => SWAP5  => stack_io(6, 6), gas(VeryLow);
    0x95 => SWAP6  => stack_io(7, 7), gas(VeryLow);
    0x96 => SWAP7  => stack_io(8, 8), gas(VeryLow);
    0x97 => SWAP8  => stack_io(9, 9), gas(VeryLow);
    0x98 => SWAP9  => stack_io(10, 10), gas(VeryLow);
    0x99 => SWAP10 => stack_io(11, 11), gas(VeryLow);
    0x9A => SWAP11 => stack_io(12, 12), gas(VeryLow);
    0x9B => SWAP12 => stack_io(13, 13), gas(VeryLow);
    0x9C => SWAP13 => stack_io(14, 14), gas(VeryLow);
    0x9D => SWAP14 => stack_io(15, 15), gas(VeryLow);
    0x9E => SWAP15 => stack_io(16, 16), gas(VeryLow);
    0x9F => SWAP16 => stack_io(17, 17), gas(VeryLow);

    0xA0 => LOG0 => stack_io(2, 0), gas(Log);
    0xA1 => LOG1 => stack_io(3, 0), gas(Log);
    0xA2 => LOG2 => stack_io(4, 0), gas(Log);
    0xA3 => LOG3 => stack_io(5, 0), gas(Log);
    0xA4 => LOG4 => stack_io(6, 0), gas(Log);

    0xF0 => CREATE       => stack_io(3, 1), gas(Create);
    0xF1 => CALL         => stack_io(7, 1), gas(Call);
    0xF2 => CALLCODE     => stack_io(7, 1), gas(Call);
    0xF3 => RETURN       => stack_io(2, 0), terminating;
    0xF4 => DELEGATECALL => stack_io(6, 1), gas(Call), since(HOMESTEAD);
    0xF5 => CREATE2      => stack_io(4, 1), gas(Create), since(CONSTANTINOPLE);
    0xFA => STATICCALL   => stack_io(6, 1), gas(Call), since(BYZANTIUM);
    0xFD => REVERT       => stack_io(2, 0), terminating, since(BYZANTIUM);
    0xFE => INVALID      => stack_io(0, 0), terminating;
    0xFF => SELFDESTRUCT => stack_io(1, 0), gas(SelfDestruct), terminating;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode() {
        let opcode = OpCode::new(0x00).unwrap();
        assert!(!opcode.is_push());
        assert_eq!(opcode.as_str(), "STOP");
        assert_eq!(opcode.get(), 0x00);
        assert_eq!(OpCode::new(0x0C), None);
        assert_eq!(OpCode::name_by_op(0xEF), "UNKNOWN");
    }

    #[test]
    fn test_immediate_size() {
        let mut expected = [0u8; 256];
        for push in PUSH1..=PUSH32 {
            expected[push as usize] = push - PUSH1 + 1;
        }

        for (i, opcode) in OPCODE_INFO.iter().enumerate() {
            if let Some(opcode) = opcode {
                assert_eq!(
                    opcode.immediate_size(),
                    expected[i],
                    "immediate_size check failed for {opcode:#?}",
                );
            }
        }
    }

    #[test]
    fn test_terminating_opcodes() {
        let terminating = [REVERT, RETURN, INVALID, SELFDESTRUCT, STOP];
        let mut opcodes = [false; 256];
        for terminating in terminating.iter() {
            opcodes[*terminating as usize] = true;
        }

        for (i, opcode) in OPCODE_INFO.into_iter().enumerate() {
            assert_eq!(
                opcode.map(|opcode| opcode.is_terminating()).unwrap_or_default(),
                opcodes[i],
                "Opcode {opcode:?} terminating check failed.",
            );
        }
    }

    #[test]
    fn test_introducing_forks() {
        assert_eq!(OpCode::PUSH0.info().since(), SHANGHAI);
        assert_eq!(OpCode::BASEFEE.info().since(), LONDON);
        assert_eq!(OpCode::DELEGATECALL.info().since(), HOMESTEAD);
        assert_eq!(OpCode::ADD.info().since(), FRONTIER);
        assert_eq!(OpCode::TSTORE.info().gas_tier(), WarmAccess);
    }

    #[test]
    fn test_push_n() {
        assert_eq!(OpCode::push_n(1), Some(OpCode::PUSH1));
        assert_eq!(OpCode::push_n(32), Some(OpCode::PUSH32));
        assert_eq!(OpCode::push_n(0), None);
        assert_eq!(OpCode::push_n(33), None);
    }

    #[test]
    fn test_parsing() {
        for i in 0..=u8::MAX {
            if let Some(op) = OpCode::new(i) {
                assert_eq!(OpCode::parse(op.as_str()), Some(op));
            }
        }
        assert_eq!(OpCode::parse("sstore"), Some(OpCode::SSTORE));
        assert_eq!(OpCode::parse("PREVRANDAO"), Some(OpCode::DIFFICULTY));
        assert_eq!(OpCode::parse("SHA3"), Some(OpCode::KECCAK256));
        assert_eq!(OpCode::parse("NOPE"), None);
    }
}
