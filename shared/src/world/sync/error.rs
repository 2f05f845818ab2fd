use thiserror::Error;

use crate::world::sync::entity_view::EntityKind;

/// Errors that can occur while mirroring two entity graphs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The two entities are of different kinds or different value types
    #[error("Cannot synchronize `{left}` ({left_kind}) with `{right}` ({right_kind}). Both sides must be the same entity type")]
    NotMutuallySynchronizable {
        left: String,
        left_kind: EntityKind,
        right: String,
        right_kind: EntityKind,
    },

    /// A child exists on one side only and cannot be created on the other
    #[error("Child `{name}` of `{location}` exists on one side only. Only extensions are created on demand")]
    ChildrenMismatch { location: String, name: String },

    /// Creating the missing extension on the other side failed
    #[error("Failed to attach extension `{name}`: {reason}")]
    Attach { name: String, reason: String },
}
