//! Settings file for `ethfill fill`.
//!
//! Every key is optional and every key can be overridden on the command
//! line:
//!
//! ```toml
//! evm-bin = "/usr/local/bin/evm"
//! evm-args = ["--verbosity", "0"]
//! timeout = 30
//! threads = 8
//! output = "fixtures/cancun.json"
//! from = "Shanghai"
//! until = "Cancun"
//! exceptions = "geth"
//!
//! [rpc]
//! endpoint = "http://localhost:8545"
//! seed-key = "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8"
//! ```

use clap::ValueEnum;
use primitives::{ForkId, B256};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};
use t8n::ExceptionMapper;

/// Errors loading a settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid settings TOML.
    #[error("parsing {path}: {source}")]
    Parse {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// Which evaluator's error messages to recognise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionDialect {
    /// go-ethereum's `evm`.
    #[default]
    Geth,
    /// The Python execution specs.
    Eels,
    /// Both.
    All,
}

impl ExceptionDialect {
    /// The mapper for this dialect.
    pub fn mapper(self) -> ExceptionMapper {
        match self {
            Self::Geth => ExceptionMapper::geth(),
            Self::Eels => ExceptionMapper::eels(),
            Self::All => ExceptionMapper::all(),
        }
    }
}

/// A live node to fill against instead of an evaluator process.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RpcConfig {
    /// JSON-RPC URL.
    pub endpoint: String,
    /// Key of a funded account used to fund each case's senders.
    pub seed_key: B256,
    /// Seconds to wait for a transaction receipt.
    #[serde(default)]
    pub receipt_timeout: Option<u64>,
}

/// Settings of a fill run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FillConfig {
    /// Evaluator binary.
    pub evm_bin: Option<PathBuf>,
    /// Arguments placed before the `t8n` subcommand.
    pub evm_args: Vec<String>,
    /// Seconds one evaluator call may take.
    pub timeout: Option<u64>,
    /// Worker threads. Defaults to the available parallelism.
    pub threads: Option<usize>,
    /// Where the fixture container is written.
    pub output: Option<PathBuf>,
    /// First fork to fill.
    pub from: Option<ForkId>,
    /// Last fork to fill.
    pub until: Option<ForkId>,
    /// Chain id forced on every spec.
    pub chain_id: Option<u64>,
    /// Directory receiving each evaluator call's input and output.
    pub dump_dir: Option<PathBuf>,
    /// Evaluator error message dialect.
    pub exceptions: Option<ExceptionDialect>,
    /// Keep filling after a case fails. Defaults to `true`.
    pub keep_going: Option<bool>,
    /// Fill against a live node.
    pub rpc: Option<RpcConfig>,
}

impl FillConfig {
    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads settings from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
