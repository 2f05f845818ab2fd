use std::{any::Any, sync::Arc};

use ripple_serde::{ByteReader, ByteWriter};

use crate::{
    error::RdError,
    identity::{identities::Identities, rd_id::RdId},
    lifetime::lifetime::Lifetime,
    protocol::{registry::EntityKey, Protocol},
    serialization::{error::SerializationError, serialization_ctx::SerializationCtx},
    world::{
        entity::{
            bind_state::BindState, bindable_core::BindableCore, error::BindError, lifecycle,
            location::Location,
        },
        sync::entity_view::EntityView,
    },
};

/// Where an entity is being attached: the protocol it joins, the registry key of its parent
/// (none for top-level entities) and the parent's location.
#[derive(Clone)]
pub struct BindParent {
    protocol: Arc<Protocol>,
    key: Option<EntityKey>,
    location: Location,
}

impl BindParent {
    pub fn new(protocol: Arc<Protocol>, key: Option<EntityKey>, location: Location) -> Self {
        Self {
            protocol,
            key,
            location,
        }
    }

    pub fn top_level(protocol: &Arc<Protocol>) -> Self {
        Self::new(protocol.clone(), None, protocol.location().clone())
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    pub fn key(&self) -> Option<EntityKey> {
        self.key
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// A node of the replicated object graph.
///
/// Implementors are cheap handles (`Clone` shares state). The lifecycle is
/// [`identify`](Bindable::identify) → [`pre_bind`](Bindable::pre_bind) →
/// [`bind`](Bindable::bind); terminating the lifetime given to `pre_bind` unbinds the entity and
/// all of its children, in reverse order.
///
/// The `pre_init` / `init` / `post_init` / `on_unbind` hooks are where concrete entities plug in
/// their wire traffic. Most of the remaining boilerplate comes from [`bindable_boilerplate!`].
pub trait Bindable: Send + Sync + 'static {
    fn core(&self) -> &BindableCore;

    fn as_dyn(&self) -> &dyn Bindable;

    fn as_any(&self) -> &dyn Any;

    /// Another handle to the same entity
    fn clone_handle(&self) -> Box<dyn Bindable>;

    fn kind_name(&self) -> &'static str;

    /// Kind tag used by the model synchronizer
    fn entity_view(&self) -> EntityView<'_>;

    /// An unbound entity of the same shape, holding copies of the current values
    fn deep_clone(&self) -> Box<dyn Bindable>;

    /// Writes the current contents, so an entity value can travel inside another entity's payload
    fn write_state(
        &self,
        _ctx: &SerializationCtx,
        _writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        Ok(())
    }

    /// Fills an unbound entity from what [`write_state`](Bindable::write_state) produced;
    /// nothing is sent
    fn read_state(
        &self,
        _ctx: &SerializationCtx,
        _reader: &mut ByteReader,
    ) -> Result<(), SerializationError> {
        Ok(())
    }

    /// Called once the entity has its id, before its children are identified
    fn on_identify(&self, _identities: &Identities) {}

    /// Called while pre-binding, before the children are pre-bound
    fn pre_init(&self, _lifetime: &Lifetime, _parent: &BindParent) -> Result<(), RdError> {
        Ok(())
    }

    /// The parent handed to this entity's children
    fn child_parent(&self, own: BindParent) -> BindParent {
        own
    }

    /// Called while binding, before the children are bound
    fn init(&self, _lifetime: &Lifetime, _protocol: &Arc<Protocol>) -> Result<(), RdError> {
        Ok(())
    }

    /// Called once the entity and its children are bound
    fn post_init(&self, _lifetime: &Lifetime, _protocol: &Arc<Protocol>) -> Result<(), RdError> {
        Ok(())
    }

    /// Called first thing when the binding lifetime terminates
    fn on_unbind(&self) {}

    fn allows_off_thread_binding(&self) -> bool {
        false
    }

    /// Whether children are pre-bound and bound inside a [`BindingScope`](super::binding_scope::BindingScope)
    fn children_need_binding_scope(&self) -> bool {
        false
    }

    fn rd_id(&self) -> RdId {
        self.core().id()
    }

    fn location(&self) -> Location {
        self.core().location()
    }

    fn bind_state(&self) -> BindState {
        self.core().state()
    }

    fn is_bound(&self) -> bool {
        self.core().state() == BindState::Bound
    }

    fn identify(&self, identities: &Identities, id: RdId) -> Result<(), BindError> {
        lifecycle::identify(self.as_dyn(), identities, id)
    }

    fn pre_bind(&self, lifetime: &Lifetime, parent: &BindParent, name: &str) -> Result<(), RdError> {
        lifecycle::pre_bind(self.as_dyn(), lifetime, parent, name)
    }

    fn bind(&self) -> Result<(), RdError> {
        lifecycle::bind(self.as_dyn())
    }

    /// Terminates the binding lifetime of this entity only. Returns `false` when not bound.
    fn unbind(&self) -> bool {
        self.core().terminate_binding()
    }
}

/// Implements the handle plumbing of [`Bindable`] for a `Clone` type, given the path of its
/// [`BindableCore`] field.
#[macro_export]
macro_rules! bindable_boilerplate {
    ($($core:ident).+) => {
        fn core(&self) -> &$crate::BindableCore {
            &self.$($core).+
        }

        fn as_dyn(&self) -> &dyn $crate::Bindable {
            self
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn clone_handle(&self) -> ::std::boxed::Box<dyn $crate::Bindable> {
            ::std::boxed::Box::new(self.clone())
        }

        fn kind_name(&self) -> &'static str {
            ::std::any::type_name::<Self>()
        }
    };
}

/// Downcasts a handle to a concrete entity type
pub fn downcast<T: Bindable + Clone>(entity: &dyn Bindable) -> Option<T> {
    entity.as_any().downcast_ref::<T>().cloned()
}
