//! # ethfill-primitives
//!
//! Value types shared by every ethfill crate: fixed-width unsigned integers with
//! wrapping arithmetic, 160-bit addresses, 256-bit hashes, storage maps and the
//! ordered set of protocol fork identifiers.
//!
//! Integer, address and hash types are the `alloy-primitives` ones. What this
//! crate adds is a single canonical textual form ([`HexCodec`]) used wherever
//! ethfill writes fixtures, plus serde adapters that read the looser forms
//! produced by hand-written specs and external evaluators.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod codec;
pub mod constants;
pub mod hardfork;
pub mod serde_hex;
mod storage;

pub use alloy_primitives::{
    self, address,
    aliases::{U128, U16, U160, U32, U64, U8},
    b256, bytes, hex, keccak256,
    ruint::UintTryFrom,
    Address, Bytes, FixedBytes, B256, U256,
};
pub use codec::{HexCodec, HexError, Quantity};
pub use hardfork::{ForkId, UnknownFork};
pub use storage::Storage;
