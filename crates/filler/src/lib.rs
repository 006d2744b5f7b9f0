//! # ethfill-filler
//!
//! Turns test cases into fixtures.
//!
//! Every case goes through [`Pending`], [`Executed`] and either [`Verified`]
//! and [`Sealed`], or [`Rejected`] with the list of [`Mismatch`]es that
//! explain why. [`Runner`] does this for many cases at once on a pool of
//! worker threads and streams the sealed fixtures to a writer.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod compiler;
mod error;
mod runner;
pub mod verify;

pub use compiler::{
    fill, Executed, FillContext, Filled, Pending, Rejected, Sealed, Verification, Verified,
};
pub use error::FillError;
pub use runner::{expand, CaseFailure, ForkFilter, RunSummary, Runner, RunnerConfig};
pub use verify::{AccountField, Location, Mismatch};
