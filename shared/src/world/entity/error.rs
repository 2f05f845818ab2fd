use thiserror::Error;

use crate::{identity::rd_id::RdId, world::entity::bind_state::BindState};

/// Misuse of the identify / pre-bind / bind lifecycle of an entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// Identify with the Null id, or pre-bind before identify
    #[error("Entity `{location}` has the Null id. Must call `identify()` with a non-Null id before binding it")]
    NullId { location: String },

    /// Identify on an entity that already carries an id
    #[error("Entity `{location}` is already identified as {id}. Ids are assigned once")]
    AlreadyIdentified { location: String, id: RdId },

    /// Pre-bind on an entity that is already attached to a parent
    #[error("Entity `{location}` is already bound under a parent. Must terminate its binding lifetime before binding it again")]
    AlreadyParented { location: String },

    /// Lifecycle step invoked in the wrong state
    #[error("Entity `{location}` must be {expected} for this operation, but is {actual}")]
    WrongBindState {
        location: String,
        expected: BindState,
        actual: BindState,
    },

    /// Binding from a thread that does not own the protocol
    #[error("Entity `{location}` must be bound on scheduler `{scheduler}`. Bind from that scheduler, inside a `BindingScope`, or mark the entity async")]
    WrongThread { location: String, scheduler: String },

    /// `bind_static` was given an id outside the reserved static range
    #[error("Static id {id} is outside the reserved range (0, {max})")]
    StaticIdOutOfRange { id: i64, max: i64 },

    /// Operation that needs a bound entity
    #[error("Entity `{location}` is not bound. Must bind it to a protocol first")]
    NotBound { location: String },

    /// A named child is not of the requested type
    #[error("Child `{name}` is not a `{expected}`")]
    ChildTypeMismatch { name: String, expected: &'static str },

    /// A named child does not exist
    #[error("Entity `{location}` has no child named `{name}`")]
    NoSuchChild { location: String, name: String },

    /// Two children with the same name
    #[error("Entity `{location}` already has a child named `{name}`. Child names must be unique")]
    DuplicateChild { location: String, name: String },
}
