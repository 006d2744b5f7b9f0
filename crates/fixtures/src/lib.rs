//! # ethfill-fixtures
//!
//! Fixture formats consumed by client test runners, and the container they
//! are shipped in.
//!
//! Each [`Fixture`] is sealed into a [`FixtureEntry`] whose identity is the
//! SHA-256 of the fixture's canonical JSON. A [`FixtureContainer`] keys
//! entries by that hash, so merging independently filled collections drops
//! duplicates instead of failing. [`FixtureWriter`] produces the same
//! document incrementally.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod blockchain;
mod container;
mod error;
mod fixture;
pub mod state;
pub mod transaction;
mod writer;

pub use blockchain::{BlockchainConfig, BlockchainFixture, FixtureBlock, FixtureHeader, FixtureTransaction};
pub use container::{FixtureContainer, MergeStats, FORMAT_VERSION};
pub use error::FixtureError;
pub use fixture::{Fixture, FixtureEntry, FixtureInfo};
pub use state::{StateConfig, StateFixture, StatePost, StateTransaction, TxIndexes};
pub use transaction::{TransactionFixture, TransactionResult};
pub use writer::{FixtureWriter, WriteStats};
