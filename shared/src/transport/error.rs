use std::io;

use thiserror::Error;

/// Failures of the framed socket transport. Background threads log these and drop the
/// connection; only construction returns them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Socket level I/O failure
    #[error("Socket {operation} failed ({kind:?}): {message}")]
    Io {
        operation: &'static str,
        kind: io::ErrorKind,
        message: String,
    },

    /// Listening socket could not be created
    #[error("Failed to listen on {address}: {message}. Pick another port or pass 0 for an ephemeral one")]
    Bind { address: String, message: String },

    /// A frame announced a length outside `8..=max`
    #[error("Frame length {length} is outside the accepted range 8..={max}. The stream is corrupt or the peer speaks another protocol")]
    InvalidFrameLength { length: i64, max: usize },

    /// Outbound frame over the configured ceiling
    #[error("Frame of {length} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },
}

impl TransportError {
    pub fn io(operation: &'static str, err: &io::Error) -> Self {
        TransportError::Io {
            operation,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
