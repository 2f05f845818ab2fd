use std::fmt;

use crate::{
    lifetime::lifetime::Lifetime,
    world::{entity::bindable::Bindable, sync::{error::SyncError, model_synchronizer::ModelSynchronizer}},
};

/// Entities that mirror their own state onto a peer of the same concrete type
pub trait Synchronizable: Send + Sync {
    /// Pipes changes between `self` and `other` in both directions until `lifetime` ends.
    /// Fails when `other` is not the same concrete type.
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError>;
}

/// Closed set of entity kinds the synchronizer dispatches on
pub enum EntityView<'a> {
    Signal(&'a dyn Synchronizable),
    Property(&'a dyn Synchronizable),
    List(&'a dyn Synchronizable),
    Set(&'a dyn Synchronizable),
    Map(&'a dyn Synchronizable),
    Model,
    Ext,
    Call,
    Endpoint,
}

impl EntityView<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityView::Signal(_) => EntityKind::Signal,
            EntityView::Property(_) => EntityKind::Property,
            EntityView::List(_) => EntityKind::List,
            EntityView::Set(_) => EntityKind::Set,
            EntityView::Map(_) => EntityKind::Map,
            EntityView::Model => EntityKind::Model,
            EntityView::Ext => EntityKind::Ext,
            EntityView::Call => EntityKind::Call,
            EntityView::Endpoint => EntityKind::Endpoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Signal,
    Property,
    List,
    Set,
    Map,
    Model,
    Ext,
    Call,
    Endpoint,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
