use ripple_serde::SerdeErr;
use thiserror::Error;

use crate::{identity::rd_id::RdId, world::entity::error::BindError};

/// Errors that can occur while writing or reading values through a serialization context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// A value was written polymorphically but its type has no marshaller
    #[error("Type `{type_name}` has no registered marshaller. Must call `Serializers::register::<{type_name}>()` before writing it polymorphically")]
    UnknownType { type_name: String },

    /// A polymorphic payload named a type id this side never registered
    #[error("Received a polymorphic value with unregistered type id {type_id}. The receiving side must call `Serializers::register()` for every type the sending side writes")]
    UnknownTypeId { type_id: RdId },

    /// Two different types hash to the same type id
    #[error("Type id {type_id} of `{attempted}` is already registered for `{existing}`. Rename one of the types")]
    DuplicateTypeId {
        type_id: RdId,
        existing: String,
        attempted: String,
    },

    /// A marshaller was handed a value of another type
    #[error("Marshaller for `{expected}` was given a value of a different type")]
    TypeMismatch { expected: String },

    /// An interned value referenced a domain the context does not carry
    #[error("Intern domain `{domain}` is not part of this serialization context. Must add it with `SerializationCtx::with_intern_root()`")]
    UnknownInternDomain { domain: String },

    /// An interned reference arrived before the value it refers to
    #[error("Intern domain `{domain}` has no value for id {id}")]
    UnknownInternId { domain: String, id: i32 },

    /// The interned value is not of the requested type
    #[error("Intern domain `{domain}` holds a value of another type under id {id}")]
    InternTypeMismatch { domain: String, id: i32 },

    /// An entity serializer was handed a plain value
    #[error("Type `{type_name}` is not an entity. `EntitySerializer` only writes values whose `as_bindable()` returns an entity")]
    NotAnEntity { type_name: String },

    /// An entity value was serialized outside of any protocol
    #[error("Cannot identify entity `{type_name}`: the serialization context has no identities. Use the context of a built protocol")]
    NoIdentities { type_name: String },

    /// The entity value could not take the id it travels with
    #[error("Failed to identify entity value: {0}")]
    Identify(#[from] BindError),

    /// Underlying buffer error
    #[error("Buffer error: {0}")]
    Serde(#[from] SerdeErr),
}
