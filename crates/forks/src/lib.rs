//! Fork registry.
//!
//! Forks are values, not types: each [`Fork`] carries its opcode set, gas
//! schedule, blob parameters and feature flags, and differences between forks
//! are table lookups. The mainnet registry is built once per process and is
//! read-only afterwards.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod fee;
mod fork;
pub mod gas;
mod registry;
mod transition;

pub use fee::BlobSchedule;
pub use fork::{
    ActiveOpcode, Fork, ForkCriteria, ForkFeatures, OpcodeSet, UnknownOpcodeError,
    TX_GAS_LIMIT_CAP,
};
pub use gas::{GasSchedule, IntrinsicGasInput};
pub use primitives::hardfork::ForkId;
pub use registry::{ForkRegistry, RegistryError};
pub use transition::{ForkSelector, TransitionFork};
