use thiserror::Error;

use crate::{identity::rd_id::RdId, serialization::error::SerializationError};

/// Errors that can occur while building a protocol or registering entities in it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. ProtocolBuilder.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// `build()` without a scheduler
    #[error("Protocol `{name}` has no scheduler. Must call `scheduler()` before `build()`")]
    MissingScheduler { name: String },

    /// `build()` without a wire
    #[error("Protocol `{name}` has no wire. Must call `wire()` before `build()`")]
    MissingWire { name: String },

    /// Registering a type in the serializer registry failed
    #[error("Failed to register a type with the protocol: {0}")]
    Registration(#[from] SerializationError),

    /// Two live entities with one id in the same protocol
    #[error("Id {id} is already bound at `{existing}`; cannot bind `{attempted}` under it. Ids must be unique within a protocol")]
    DuplicateEntityId {
        id: RdId,
        existing: String,
        attempted: String,
    },
}
