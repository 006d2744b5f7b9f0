use std::time::Duration;

/// Failure of a transition tool call. Carries whatever the evaluator printed
/// so the cause can be diagnosed without rerunning.
#[derive(Debug, thiserror::Error)]
pub enum TransitionToolError {
    /// The evaluator could not be started or talked to.
    #[error("failed to run {binary}: {source}")]
    Spawn {
        /// Evaluator binary.
        binary: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The evaluator exited with a failure status.
    #[error("evaluator exited with {status}: {stderr}")]
    Exit {
        /// Exit status as printed by the OS.
        status: String,
        /// Raw stdout.
        stdout: String,
        /// Raw stderr.
        stderr: String,
    },
    /// The evaluator's output is not a valid result.
    #[error("malformed evaluator output: {reason}")]
    MalformedOutput {
        /// What is wrong with it.
        reason: String,
        /// Raw stdout.
        stdout: String,
        /// Raw stderr.
        stderr: String,
    },
    /// The call did not finish in time. The process was killed.
    #[error("evaluator timed out after {0:?}")]
    Timeout(Duration),
    /// The run was cancelled. The process was killed.
    #[error("evaluation cancelled")]
    Cancelled,
    /// The node answered with a JSON-RPC error object.
    #[error("{method}: {message} ({code})")]
    Rpc {
        /// Method that failed.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Message as sent by the node.
        message: String,
    },
    /// The node could not be reached or its response could not be read.
    #[error("rpc transport: {0}")]
    Transport(String),
    /// The backend cannot express the request.
    #[error("unsupported by this backend: {0}")]
    Unsupported(String),
    /// The request could not be serialized.
    #[error("serializing request: {0}")]
    Request(#[from] serde_json::Error),
}

impl TransitionToolError {
    /// Raw evaluator output attached to the error, if any.
    pub fn diagnostics(&self) -> Option<(&str, &str)> {
        match self {
            Self::Exit { stdout, stderr, .. } | Self::MalformedOutput { stdout, stderr, .. } => {
                Some((stdout, stderr))
            }
            _ => None,
        }
    }
}
