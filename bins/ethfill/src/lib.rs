//! The `ethfill` command line: loads spec documents, drives the filler and
//! writes fixture containers.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod cmd;
pub mod config;
mod dir_utils;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
/// Does nothing if a subscriber is already installed.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
