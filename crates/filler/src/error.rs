use primitives::ForkId;
use t8n::TransitionToolError;

/// Failure to fill one test case. Unlike a rejection, nothing can be said
/// about whether the case is correct.
#[derive(Debug, thiserror::Error)]
pub enum FillError {
    /// The evaluator failed.
    #[error("{case}: {source}")]
    Tool {
        /// Test case id.
        case: String,
        /// Underlying error.
        #[source]
        source: TransitionToolError,
    },
    /// The evaluator answered, but the answer is inconsistent.
    #[error("{case}: {reason}")]
    Malformed {
        /// Test case id.
        case: String,
        /// What is inconsistent.
        reason: String,
    },
    /// The case names a fork the registry does not have.
    #[error("{case}: fork {fork} is not in the registry")]
    UnknownFork {
        /// Test case id.
        case: String,
        /// The fork.
        fork: ForkId,
    },
    /// The run was cancelled before the case was sealed.
    #[error("cancelled")]
    Cancelled,
    /// The fixture could not be serialized for hashing.
    #[error("serializing fixture: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FillError {
    pub(crate) fn tool(case: &str, source: TransitionToolError) -> Self {
        match source {
            TransitionToolError::Cancelled => Self::Cancelled,
            source => Self::Tool {
                case: case.to_string(),
                source,
            },
        }
    }

    /// Raw evaluator output attached to the error, if any.
    pub fn diagnostics(&self) -> Option<(&str, &str)> {
        match self {
            Self::Tool { source, .. } => source.diagnostics(),
            _ => None,
        }
    }
}
