use primitives::B256;

/// Errors reading or writing fixtures.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Invalid fixture JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The container was written by an incompatible version.
    #[error("unsupported fixture container version {0}")]
    UnsupportedVersion(String),
    /// An entry's key or stored hash does not match its content.
    #[error("fixture {0} does not match its content hash")]
    HashMismatch(B256),
    /// The writer was used after [`finish`](crate::FixtureWriter::finish).
    #[error("fixture writer already finished")]
    Finished,
}
