//! # ethfill-specs
//!
//! Declarative test specifications and their expansion into fork-specific
//! test cases.
//!
//! A [`Spec`] holds a pre-state, an action (one transaction, a chain of
//! blocks, or a bare transaction) and the expected outcome, together with the
//! range of forks it applies to. [`Spec::generate`] fills in every value the
//! author left unset with the fork's defaults, signs transactions, checks that
//! the fork supports everything the spec uses, and returns [`TestCase`]s that
//! each own their data.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod account;
pub mod authorization;
mod document;
pub mod env;
pub mod exception;
mod expect;
pub mod header;
pub mod signing;
pub mod spec;
pub mod transaction;
pub mod trie;

pub use account::{Account, Alloc};
pub use authorization::{AuthorizationTuple, SignedAuthorization};
pub use document::{DocumentError, SpecDocument};
pub use env::{Environment, ResolvedEnvironment, Withdrawal};
pub use exception::{BlockException, Exception, ExceptionCategory, TransactionException};
pub use expect::{AccountExpectation, ExpectedAccount, Expectation};
pub use header::BlockHeader;
pub use spec::{
    Block, BlockCase, BlockchainCase, BlockchainTest, FixtureFormat, ForkRange, Spec, SpecError,
    SpecForkMismatchError, SpecKind, StateCase, StateTest, TestCase, TestCaseKind,
    TransactionCase, TransactionTest, UnsupportedFeature,
};
pub use transaction::{
    AccessListItem, ResolvedTransaction, Transaction, TransactionError, TxSignature, TxType,
};
