//! # ethfill-t8n
//!
//! Clients for state-transition evaluators.
//!
//! A [`TransitionTool`] takes a pre-state, a block environment and a list of
//! signed transactions and returns the post-state, the receipts and the
//! transactions it refused. Two backends are provided: [`ExternalTool`] runs a
//! `t8n` binary per call, [`RpcBackend`] replays the transactions on a live
//! node.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cancel;
mod error;
pub mod exception_map;
pub mod external;
pub mod rpc;
pub mod types;

pub use cancel::CancelToken;
pub use error::TransitionToolError;
pub use exception_map::ExceptionMapper;
pub use external::ExternalTool;
pub use rpc::RpcBackend;
pub use types::{Receipt, RejectedTx, T8nOutput, T8nRequest, T8nResult};

/// A state-transition evaluator.
///
/// Implementations must be usable from several worker threads at once.
pub trait TransitionTool: Send + Sync {
    /// Human readable name, used in logs and fixture metadata.
    fn name(&self) -> String;

    /// Executes `request`. Returns [`TransitionToolError::Cancelled`] once
    /// `cancel` fires, even when the evaluation is already running.
    fn evaluate(
        &self,
        request: &T8nRequest,
        cancel: &CancelToken,
    ) -> Result<T8nOutput, TransitionToolError>;

    /// Whether the reported state root is the root of the reported
    /// post-state alone. Backends that execute on top of an existing chain
    /// return `false`.
    fn computes_state_root(&self) -> bool {
        true
    }
}

impl<T: TransitionTool + ?Sized> TransitionTool for std::sync::Arc<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn evaluate(
        &self,
        request: &T8nRequest,
        cancel: &CancelToken,
    ) -> Result<T8nOutput, TransitionToolError> {
        (**self).evaluate(request, cancel)
    }

    fn computes_state_root(&self) -> bool {
        (**self).computes_state_root()
    }
}
