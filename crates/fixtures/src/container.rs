use crate::{FixtureEntry, FixtureError};
use primitives::B256;
use serde::{Deserialize, Serialize};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};
use tracing::debug;

/// Version tag written at the top of every container.
pub const FORMAT_VERSION: &str = "ethfill/1";

/// A versioned collection of sealed fixtures keyed by content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureContainer {
    version: String,
    fixtures: BTreeMap<B256, FixtureEntry>,
}

impl Default for FixtureContainer {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            fixtures: BTreeMap::new(),
        }
    }
}

/// Outcome of [`FixtureContainer::merge`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries that were new.
    pub added: usize,
    /// Entries whose hash was already present.
    pub duplicates: usize,
}

impl FixtureContainer {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Adds `entry`. Returns `false` if an entry with the same hash is
    /// already present, in which case the container is unchanged.
    pub fn insert(&mut self, entry: FixtureEntry) -> bool {
        match self.fixtures.entry(entry.hash()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Moves every entry of `other` into `self`, dropping duplicates.
    pub fn merge(&mut self, other: FixtureContainer) -> MergeStats {
        let mut stats = MergeStats::default();
        for (_, entry) in other.fixtures {
            if self.insert(entry) {
                stats.added += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        debug!(added = stats.added, duplicates = stats.duplicates, "merged fixtures");
        stats
    }

    /// Entry with content hash `hash`.
    pub fn get(&self, hash: &B256) -> Option<&FixtureEntry> {
        self.fixtures.get(hash)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Returns `true` if the container has no entries.
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Entries in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &FixtureEntry> {
        self.fixtures.values()
    }

    /// Reads a container, checking its version and every entry's hash.
    pub fn read_from(reader: impl Read) -> Result<Self, FixtureError> {
        let container: Self = serde_json::from_reader(reader)?;
        if container.version != FORMAT_VERSION {
            return Err(FixtureError::UnsupportedVersion(container.version));
        }
        for (key, entry) in &container.fixtures {
            if *key != entry.hash() || !entry.verify_hash() {
                return Err(FixtureError::HashMismatch(*key));
            }
        }
        Ok(container)
    }

    /// Writes the container as indented JSON.
    pub fn write_to(&self, writer: impl Write) -> Result<(), FixtureError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// [`read_from`](Self::read_from) a file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// [`write_to`](Self::write_to) a file, replacing it.
    pub fn save(&self, path: &Path) -> Result<(), FixtureError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Extend<FixtureEntry> for FixtureContainer {
    fn extend<I: IntoIterator<Item = FixtureEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl FromIterator<FixtureEntry> for FixtureContainer {
    fn from_iter<I: IntoIterator<Item = FixtureEntry>>(iter: I) -> Self {
        let mut container = Self::new();
        container.extend(iter);
        container
    }
}
