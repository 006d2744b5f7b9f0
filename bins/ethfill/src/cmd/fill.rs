use crate::{
    config::{ConfigError, ExceptionDialect, FillConfig, RpcConfig},
    dir_utils::find_all_json_files,
};
use clap::Parser;
use filler::{ForkFilter, RunSummary, Runner, RunnerConfig};
use fixtures::{FixtureError, FixtureWriter};
use primitives::{constants::DEFAULT_CHAIN_ID, ForkId, B256};
use specs::{DocumentError, Spec, SpecDocument};
use std::{
    collections::HashSet,
    fmt::Write as _,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use t8n::{ExternalTool, RpcBackend, TransitionTool};
use tracing::info;

/// Evaluator used when none is configured.
pub const DEFAULT_EVM_BIN: &str = "evm";
/// Output used when none is configured.
pub const DEFAULT_OUTPUT: &str = "fixtures.json";

/// Errors of `ethfill fill`.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path {0} does not exist")]
    InvalidPath(String),
    #[error("no spec files found in {0}")]
    NoJsonFiles(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{path}: spec {name} is already defined in another file")]
    DuplicateSpec { name: String, path: String },
    #[error("filling against a node needs a seed key")]
    MissingSeedKey,
    #[error("writing {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: FixtureError,
    },
    /// Some cases were rejected, failed or never ran, or some specs could
    /// not be expanded. The details were already printed.
    #[error("{failed} of {total} test cases did not produce a fixture")]
    Failed { failed: usize, total: usize },
}

/// `fill` subcommand
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Spec documents, or folders searched recursively for `.json` files
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
    /// TOML settings file. Flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Evaluator binary [default: evm]
    #[arg(long)]
    evm_bin: Option<PathBuf>,
    /// Argument passed to the evaluator before `t8n`. Repeatable
    #[arg(long = "evm-arg", allow_hyphen_values = true)]
    evm_args: Vec<String>,
    /// Seconds one evaluator call may take
    #[arg(long)]
    timeout: Option<u64>,
    /// Worker threads [default: available parallelism]
    #[arg(short = 'j', long)]
    threads: Option<usize>,
    /// Fixture container to write [default: fixtures.json]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// First fork to fill
    #[arg(long)]
    from: Option<ForkId>,
    /// Last fork to fill
    #[arg(long)]
    until: Option<ForkId>,
    /// Chain id forced on every spec
    #[arg(long)]
    chain_id: Option<u64>,
    /// Keep each evaluator call's input and output in this folder
    #[arg(long)]
    dump_dir: Option<PathBuf>,
    /// Evaluator error message dialect [default: geth]
    #[arg(long, value_enum)]
    exceptions: Option<ExceptionDialect>,
    /// Fill against a live node instead of an evaluator
    #[arg(long)]
    rpc_endpoint: Option<String>,
    /// Key of the funded account on the node
    #[arg(long)]
    rpc_seed_key: Option<B256>,
    /// Stop at the first case that fails
    #[arg(long)]
    fail_fast: bool,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cmd {
    /// Runs `fill` command.
    pub fn run(&self) -> Result<(), Error> {
        let summary = self.fill()?;
        print!("{}", report(&summary));
        if summary.is_success() {
            return Ok(());
        }
        let failed = summary.rejected.len() + summary.failures.len() + summary.unfinished;
        Err(Error::Failed {
            failed: failed + summary.spec_errors.len(),
            total: summary.sealed + summary.duplicates + failed,
        })
    }

    fn fill(&self) -> Result<RunSummary, Error> {
        let config = self.settings()?;
        let mut specs = self.load_specs()?;
        if let Some(chain_id) = config.chain_id {
            specs.iter_mut().for_each(|spec| spec.chain_id = chain_id);
        }

        let tool = build_tool(&config);
        let mapper = config.exceptions.unwrap_or_default().mapper();
        let runner = Runner::new(tool.as_ref(), &mapper).with_config(RunnerConfig {
            threads: config.threads,
            keep_going: config.keep_going.unwrap_or(true),
            progress: !self.no_progress,
        });
        let filter = ForkFilter {
            from: config.from,
            until: config.until,
        };

        let output = config.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        info!(specs = specs.len(), tool = %tool.name(), output = %output.display(), "filling");
        let output_error = |source: FixtureError| Error::Output {
            path: output.display().to_string(),
            source,
        };
        let mut writer = FixtureWriter::new(create_output(&output).map_err(|e| output_error(e.into()))?);
        let summary = runner
            .run_specs(&specs, filter, &mut writer)
            .map_err(output_error)?;
        writer.finish().map_err(output_error)?;
        writer.into_inner().flush().map_err(|e| output_error(e.into()))?;
        Ok(summary)
    }

    /// The settings file with this command's flags applied on top.
    fn settings(&self) -> Result<FillConfig, Error> {
        let mut config = match &self.config {
            Some(path) => FillConfig::load(path)?,
            None => FillConfig::default(),
        };
        if let Some(evm_bin) = &self.evm_bin {
            config.evm_bin = Some(evm_bin.clone());
        }
        if !self.evm_args.is_empty() {
            config.evm_args = self.evm_args.clone();
        }
        config.timeout = self.timeout.or(config.timeout);
        config.threads = self.threads.or(config.threads);
        config.output = self.output.clone().or(config.output);
        config.from = self.from.or(config.from);
        config.until = self.until.or(config.until);
        config.chain_id = self.chain_id.or(config.chain_id);
        config.dump_dir = self.dump_dir.clone().or(config.dump_dir);
        config.exceptions = self.exceptions.or(config.exceptions);
        if self.fail_fast {
            config.keep_going = Some(false);
        }
        if let Some(endpoint) = &self.rpc_endpoint {
            let file = config.rpc.take();
            let seed_key = self
                .rpc_seed_key
                .or(file.as_ref().map(|rpc| rpc.seed_key))
                .ok_or(Error::MissingSeedKey)?;
            config.rpc = Some(RpcConfig {
                endpoint: endpoint.clone(),
                seed_key,
                receipt_timeout: file.and_then(|rpc| rpc.receipt_timeout),
            });
        } else if let (Some(rpc), Some(seed_key)) = (&mut config.rpc, self.rpc_seed_key) {
            rpc.seed_key = seed_key;
        }
        Ok(config)
    }

    /// Every spec under the given paths. Names must be unique across files.
    fn load_specs(&self) -> Result<Vec<Spec>, Error> {
        let mut specs = Vec::new();
        let mut names = HashSet::new();
        for path in &self.paths {
            if !path.exists() {
                return Err(Error::InvalidPath(path.display().to_string()));
            }
            let files = find_all_json_files(path);
            if files.is_empty() {
                return Err(Error::NoJsonFiles(path.display().to_string()));
            }
            for file in files {
                for spec in SpecDocument::load(&file)? {
                    if !names.insert(spec.name.clone()) {
                        return Err(Error::DuplicateSpec {
                            name: spec.name,
                            path: file.display().to_string(),
                        });
                    }
                    specs.push(spec);
                }
            }
        }
        Ok(specs)
    }
}

fn build_tool(config: &FillConfig) -> Box<dyn TransitionTool> {
    if let Some(rpc) = &config.rpc {
        let chain_id = config.chain_id.unwrap_or(DEFAULT_CHAIN_ID);
        let mut backend = RpcBackend::new(rpc.endpoint.clone(), chain_id, rpc.seed_key);
        if let Some(secs) = rpc.receipt_timeout {
            backend = backend.with_receipt_timeout(Duration::from_secs(secs));
        }
        return Box::new(backend);
    }

    let binary = config
        .evm_bin
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EVM_BIN));
    let mut tool = ExternalTool::new(binary).with_args(config.evm_args.iter().cloned());
    if let Some(secs) = config.timeout {
        tool = tool.with_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = &config.dump_dir {
        tool = tool.with_dump_dir(dir);
    }
    Box::new(tool)
}

fn create_output(path: &Path) -> std::io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Human readable outcome of a run.
fn report(summary: &RunSummary) -> String {
    let mut out = String::new();
    for rejected in &summary.rejected {
        let _ = writeln!(out, "{rejected}");
    }
    for failure in &summary.failures {
        let _ = writeln!(out, "{} failed: {}", failure.case_id, failure.error);
        if let Some((stdout, stderr)) = failure.error.diagnostics() {
            if !stdout.trim().is_empty() {
                let _ = writeln!(out, "  stdout: {}", stdout.trim());
            }
            if !stderr.trim().is_empty() {
                let _ = writeln!(out, "  stderr: {}", stderr.trim());
            }
        }
    }
    for error in &summary.spec_errors {
        let _ = writeln!(out, "spec skipped: {error}");
    }
    let _ = writeln!(
        out,
        "\n{} sealed, {} duplicates, {} rejected, {} failed, {} unfinished, {} specs skipped in {:.2?}",
        summary.sealed,
        summary.duplicates,
        summary.rejected.len(),
        summary.failures.len(),
        summary.unfinished,
        summary.spec_errors.len(),
        summary.elapsed,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::{Fixture, FixtureContainer};

    const TX_SPECS: &str = r#"[
        { "name": "plain_transfer", "type": "transaction_test", "forks": { "validFrom": "Cancun", "validUntil": "Prague" }, "transaction": { "value": 1 } },
        { "name": "starved", "type": "transaction_test", "forks": { "validFrom": "Cancun", "validUntil": "Prague" }, "transaction": { "gasLimit": 20000, "expectException": "TransactionException.INTRINSIC_GAS_TOO_LOW" } }
    ]"#;

    fn parse(args: &[&str]) -> Cmd {
        Cmd::try_parse_from(std::iter::once("fill").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("fill.toml");
        fs::write(&config, "evm-bin = \"/opt/evm\"\nthreads = 2\nfrom = \"Shanghai\"\nexceptions = \"eels\"\n").unwrap();

        let cmd = parse(&[
            "specs",
            "--config",
            config.to_str().unwrap(),
            "--threads",
            "8",
            "--until",
            "Prague",
            "--evm-arg",
            "--verbosity=0",
            "--fail-fast",
        ]);
        let settings = cmd.settings().unwrap();
        assert_eq!(settings.evm_bin, Some(PathBuf::from("/opt/evm")));
        assert_eq!(settings.threads, Some(8));
        assert_eq!(settings.from, Some(ForkId::SHANGHAI));
        assert_eq!(settings.until, Some(ForkId::PRAGUE));
        assert_eq!(settings.evm_args, ["--verbosity=0"]);
        assert_eq!(settings.exceptions, Some(ExceptionDialect::Eels));
        assert_eq!(settings.keep_going, Some(false));
    }

    #[test]
    fn node_mode_needs_a_seed_key() {
        let cmd = parse(&["specs", "--rpc-endpoint", "http://localhost:8545"]);
        assert!(matches!(cmd.settings(), Err(Error::MissingSeedKey)));

        let key = format!("0x{}", "11".repeat(32));
        let cmd = parse(&["specs", "--rpc-endpoint", "http://localhost:8545", "--rpc-seed-key", &key]);
        let rpc = cmd.settings().unwrap().rpc.unwrap();
        assert_eq!(rpc.seed_key, B256::repeat_byte(0x11));
    }

    #[test]
    fn unknown_fork_flag_is_rejected() {
        assert!(Cmd::try_parse_from(["fill", "specs", "--from", "Atlantis"]).is_err());
    }

    #[test]
    fn missing_path() {
        let cmd = parse(&["/definitely/not/here"]);
        assert!(matches!(cmd.load_specs(), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn duplicate_names_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), TX_SPECS).unwrap();
        fs::write(dir.path().join("b.json"), TX_SPECS).unwrap();
        let cmd = parse(&[dir.path().to_str().unwrap()]);
        assert!(matches!(
            cmd.load_specs(),
            Err(Error::DuplicateSpec { name, .. }) if name == "plain_transfer"
        ));
    }

    #[test]
    fn transaction_specs_fill_without_an_evaluator() {
        let dir = tempfile::tempdir().unwrap();
        let specs = dir.path().join("txs.json");
        fs::write(&specs, TX_SPECS).unwrap();
        let output = dir.path().join("out/fixtures.json");

        let cmd = parse(&[
            specs.to_str().unwrap(),
            "--evm-bin",
            "/definitely/not/an/evm",
            "--output",
            output.to_str().unwrap(),
            "--no-progress",
        ]);
        cmd.run().unwrap();

        let container = FixtureContainer::load(&output).unwrap();
        assert_eq!(container.len(), 4);
        assert!(container
            .iter()
            .all(|entry| matches!(entry.fixture(), Fixture::TransactionTest(_))));
    }

    #[test]
    fn report_lists_what_went_wrong() {
        let summary = RunSummary {
            sealed: 3,
            ..Default::default()
        };
        let text = report(&summary);
        assert!(text.contains("3 sealed"));
        assert!(text.contains("0 rejected"));
    }
}
