use crate::{container::FORMAT_VERSION, FixtureEntry, FixtureError};
use primitives::B256;
use std::{collections::HashSet, io::Write};
use tracing::{debug, trace};

/// Counters of a [`FixtureWriter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Entries written.
    pub written: usize,
    /// Entries skipped because their hash was already written.
    pub duplicates: usize,
}

/// Streams a fixture container one entry at a time.
///
/// The output is the same document [`FixtureContainer::write_to`] produces,
/// with entries in write order instead of hash order. Only the hashes of the
/// entries written so far are kept in memory.
///
/// [`FixtureContainer::write_to`]: crate::FixtureContainer::write_to
#[derive(Debug)]
pub struct FixtureWriter<W: Write> {
    out: W,
    seen: HashSet<B256>,
    stats: WriteStats,
    started: bool,
    finished: bool,
}

impl<W: Write> FixtureWriter<W> {
    /// A writer emitting to `out`. Nothing is written until the first entry
    /// or [`finish`](Self::finish).
    pub fn new(out: W) -> Self {
        Self {
            out,
            seen: HashSet::new(),
            stats: WriteStats::default(),
            started: false,
            finished: false,
        }
    }

    fn start(&mut self) -> Result<(), FixtureError> {
        if !self.started {
            write!(self.out, "{{\n  \"version\": ")?;
            serde_json::to_writer(&mut self.out, FORMAT_VERSION)?;
            write!(self.out, ",\n  \"fixtures\": {{")?;
            self.started = true;
        }
        Ok(())
    }

    /// Appends `entry`. Returns `false` without writing anything if an
    /// entry with the same hash was already written.
    pub fn write(&mut self, entry: &FixtureEntry) -> Result<bool, FixtureError> {
        if self.finished {
            return Err(FixtureError::Finished);
        }
        let hash = entry.hash();
        if !self.seen.insert(hash) {
            self.stats.duplicates += 1;
            trace!(%hash, id = %entry.info().test_id, "skipping duplicate fixture");
            return Ok(false);
        }
        self.start()?;
        if self.stats.written > 0 {
            write!(self.out, ",")?;
        }
        write!(self.out, "\n    ")?;
        serde_json::to_writer(&mut self.out, &hash)?;
        write!(self.out, ": ")?;
        serde_json::to_writer(&mut self.out, entry)?;
        self.stats.written += 1;
        debug!(%hash, id = %entry.info().test_id, "wrote fixture");
        Ok(true)
    }

    /// Counters so far.
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Closes the document and flushes. Later writes fail with
    /// [`FixtureError::Finished`]; finishing twice is a no-op.
    pub fn finish(&mut self) -> Result<WriteStats, FixtureError> {
        if !self.finished {
            self.start()?;
            write!(self.out, "\n  }}\n}}\n")?;
            self.out.flush()?;
            self.finished = true;
        }
        Ok(self.stats)
    }

    /// The underlying output.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixture::tests::transaction_fixture, FixtureContainer};
    use primitives::ForkId;

    fn entry(fork: ForkId) -> FixtureEntry {
        FixtureEntry::seal(transaction_fixture(fork), fork.name(), fork.name(), "evm").unwrap()
    }

    #[test]
    fn streamed_document_reads_back() {
        let mut writer = FixtureWriter::new(Vec::new());
        assert!(writer.write(&entry(ForkId::CANCUN)).unwrap());
        assert!(writer.write(&entry(ForkId::PRAGUE)).unwrap());
        assert!(!writer.write(&entry(ForkId::CANCUN)).unwrap());
        let stats = writer.finish().unwrap();
        assert_eq!(stats, WriteStats { written: 2, duplicates: 1 });

        let container = FixtureContainer::read_from(writer.into_inner().as_slice()).unwrap();
        assert_eq!(container.len(), 2);
        assert!(container.get(&entry(ForkId::PRAGUE).hash()).is_some());
    }

    #[test]
    fn empty_document() {
        let mut writer = FixtureWriter::new(Vec::new());
        writer.finish().unwrap();
        let container = FixtureContainer::read_from(writer.into_inner().as_slice()).unwrap();
        assert!(container.is_empty());
    }

    #[test]
    fn write_after_finish_fails() {
        let mut writer = FixtureWriter::new(Vec::new());
        writer.finish().unwrap();
        writer.finish().unwrap();
        assert!(matches!(
            writer.write(&entry(ForkId::CANCUN)),
            Err(FixtureError::Finished)
        ));
    }

    #[test]
    fn streams_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut writer = FixtureWriter::new(std::fs::File::create(&path).unwrap());
        writer.write(&entry(ForkId::OSAKA)).unwrap();
        writer.finish().unwrap();
        assert_eq!(FixtureContainer::load(&path).unwrap().len(), 1);
    }
}
