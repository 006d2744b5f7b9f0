use crate::dir_utils::find_all_json_files;
use clap::Parser;
use fixtures::{FixtureContainer, FixtureError, MergeStats};
use std::path::PathBuf;
use tracing::info;

/// Errors of `ethfill merge`.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Fixture {
        path: String,
        #[source]
        source: FixtureError,
    },
    #[error("no fixture files found in {0}")]
    NoJsonFiles(String),
}

/// `merge` subcommand
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Fixture containers, or folders searched recursively for `.json` files
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
    /// Merged container
    #[arg(short, long)]
    output: PathBuf,
}

impl Cmd {
    /// Runs `merge` command.
    pub fn run(&self) -> Result<(), Error> {
        let (merged, stats) = self.merge()?;
        merged.save(&self.output).map_err(|source| Error::Fixture {
            path: self.output.display().to_string(),
            source,
        })?;
        println!(
            "{} fixtures written to {} ({} duplicates dropped)",
            merged.len(),
            self.output.display(),
            stats.duplicates
        );
        Ok(())
    }

    fn merge(&self) -> Result<(FixtureContainer, MergeStats), Error> {
        let mut merged = FixtureContainer::new();
        let mut total = MergeStats::default();
        for path in &self.paths {
            let files: Vec<_> = find_all_json_files(path)
                .into_iter()
                .filter(|file| *file != self.output)
                .collect();
            if files.is_empty() {
                return Err(Error::NoJsonFiles(path.display().to_string()));
            }
            for file in files {
                let container = FixtureContainer::load(&file).map_err(|source| Error::Fixture {
                    path: file.display().to_string(),
                    source,
                })?;
                let stats = merged.merge(container);
                info!(file = %file.display(), added = stats.added, duplicates = stats.duplicates, "merged");
                total.added += stats.added;
                total.duplicates += stats.duplicates;
            }
        }
        Ok((merged, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::{Fixture, FixtureEntry, TransactionFixture};
    use primitives::Bytes;
    use std::{collections::BTreeMap, ffi::OsStr, path::Path};

    fn entry(byte: u8) -> FixtureEntry {
        let fixture = Fixture::TransactionTest(TransactionFixture {
            txbytes: Bytes::from(vec![byte]),
            result: BTreeMap::new(),
        });
        FixtureEntry::seal(fixture, format!("tx_{byte}"), "Cancun", "evm").unwrap()
    }

    fn save(path: &Path, entries: impl IntoIterator<Item = FixtureEntry>) {
        entries.into_iter().collect::<FixtureContainer>().save(path).unwrap();
    }

    #[test]
    fn merges_a_folder_and_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("a.json"), [entry(1), entry(2)]);
        save(&dir.path().join("b.json"), [entry(2), entry(3)]);
        let output = dir.path().join("merged.json");

        let cmd = Cmd::try_parse_from([
            OsStr::new("merge"),
            dir.path().as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ])
        .unwrap();
        cmd.run().unwrap();

        let merged = FixtureContainer::load(&output).unwrap();
        assert_eq!(merged.len(), 3);
        assert!(merged.get(&entry(3).hash()).is_some());
    }

    #[test]
    fn rejects_a_tampered_container() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        save(&file, [entry(1)]);
        let text = std::fs::read_to_string(&file).unwrap().replace("0x01", "0x02");
        std::fs::write(&file, text).unwrap();

        let cmd = Cmd {
            paths: vec![file],
            output: dir.path().join("out.json"),
        };
        assert!(matches!(cmd.merge(), Err(Error::Fixture { .. })));
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = Cmd {
            paths: vec![dir.path().to_path_buf()],
            output: dir.path().join("out.json"),
        };
        assert!(matches!(cmd.merge(), Err(Error::NoJsonFiles(_))));
    }
}
