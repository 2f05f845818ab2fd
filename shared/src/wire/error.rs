use thiserror::Error;

use crate::{identity::rd_id::RdId, serialization::error::SerializationError};

/// Errors that can occur when handing messages to, or subscribing on, a wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The Null id can neither send nor receive
    #[error("Cannot {operation} with the Null id. The entity must be identified and bound first")]
    NullId { operation: &'static str },

    /// Two live subscriptions for one id
    #[error("Id {id} already has a live subscription. An id may only be bound once per wire")]
    DuplicateSubscription { id: RdId },

    /// Outbound frame over the configured ceiling
    #[error("Frame of {length} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    /// The wire has been torn down
    #[error("Wire is closed. Its lifetime has terminated")]
    Closed,

    /// The payload could not be serialized
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] SerializationError),
}
