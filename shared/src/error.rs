use ripple_serde::SerdeErr;
use thiserror::Error;

use crate::{
    protocol::error::ProtocolError,
    serialization::error::SerializationError,
    wire::error::WireError,
    world::{
        component::error::ComponentError, entity::error::BindError, sync::error::SyncError,
        task::error::RpcError,
    },
};

/// Any failure surfaced by an entity operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RdError {
    /// Misuse of the bind lifecycle
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Malformed inbound payload
    #[error(transparent)]
    Serde(#[from] SerdeErr),

    /// A replicated container rejected a remote change
    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
