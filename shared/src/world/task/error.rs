use thiserror::Error;

use crate::world::task::task_result::RdFault;

/// Errors returned by synchronous calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No result within the error threshold of the call's `RpcTimeouts`
    #[error("Call `{location}` timed out after {millis} ms. Raise the timeouts or use `start` and wait on the task")]
    Timeout { location: String, millis: u128 },

    /// The call or the answering endpoint was unbound before a result arrived
    #[error("Call `{location}` was cancelled")]
    Cancelled { location: String },

    /// The remote handler failed
    #[error("Remote handler failed: {0}")]
    Fault(RdFault),

    /// Calls can only be started once the call is bound
    #[error("Call `{location}` is not bound. Bind it before starting requests")]
    NotBound { location: String },
}
