//! Subcommands.

pub mod asm;
pub mod fill;
pub mod forks;
pub mod merge;

use clap::{Parser, Subcommand};

/// Ethereum conformance fixture filler.
#[derive(Parser, Debug)]
#[command(name = "ethfill", version, infer_subcommands = true)]
pub struct MainCmd {
    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[allow(clippy::large_enum_variant)]
enum Command {
    /// Fill fixtures from spec documents
    Fill(fill::Cmd),
    /// Merge fixture containers
    Merge(merge::Cmd),
    /// Assemble or disassemble bytecode
    Asm(asm::Cmd),
    /// List the known forks and transitions
    Forks(forks::Cmd),
}

/// Error of any subcommand.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fill(#[from] fill::Error),
    #[error(transparent)]
    Merge(#[from] merge::Error),
    #[error(transparent)]
    Asm(#[from] asm::Error),
}

impl MainCmd {
    /// Initialises logging and runs the subcommand.
    pub fn run(&self) -> Result<(), Error> {
        crate::init_logging(&self.log_level);
        match &self.command {
            Command::Fill(cmd) => cmd.run().map_err(Into::into),
            Command::Merge(cmd) => cmd.run().map_err(Into::into),
            Command::Asm(cmd) => cmd.run().map_err(Into::into),
            Command::Forks(cmd) => {
                cmd.run();
                Ok(())
            }
        }
    }
}
