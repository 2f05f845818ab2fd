//! The identify / pre-bind / bind walk shared by every entity.

use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::{
    error::RdError,
    identity::{identities::Identities, rd_id::RdId},
    lifetime::lifetime::Lifetime,
    protocol::registry::{EntityKey, EntityRegistry},
    world::entity::{
        bind_state::BindState,
        bindable::{BindParent, Bindable},
        binding_scope::BindingScope,
        error::BindError,
    },
};

/// Assigns `id` to `entity` and derived ids to all of its children
pub fn identify(entity: &dyn Bindable, identities: &Identities, id: RdId) -> Result<(), BindError> {
    let core = entity.core();
    if id.is_null() {
        return Err(BindError::NullId {
            location: core.location().to_string(),
        });
    }
    core.assign_id(id)?;
    entity.on_identify(identities);

    for (name, child) in core.children() {
        let child_id = identities.mix(id, &format!(".{}", name));
        identify(child.as_ref(), identities, child_id)?;
    }
    Ok(())
}

pub fn pre_bind(
    entity: &dyn Bindable,
    lifetime: &Lifetime,
    parent: &BindParent,
    name: &str,
) -> Result<(), RdError> {
    let core = entity.core();
    let id = core.id();
    let location = parent.location().sub(name);

    if id.is_null() {
        return Err(BindError::NullId {
            location: location.to_string(),
        }
        .into());
    }
    if core.state() != BindState::NotBound {
        return Err(BindError::AlreadyParented {
            location: core.location().to_string(),
        }
        .into());
    }

    let protocol = parent.protocol().clone();
    let thread_allowed = entity.allows_off_thread_binding()
        || BindingScope::is_active()
        || protocol.scheduler().is_active();
    if !thread_allowed {
        return Err(BindError::WrongThread {
            location: location.to_string(),
            scheduler: protocol.scheduler().name().to_string(),
        }
        .into());
    }

    let definition = lifetime.create_nested();
    if !definition.is_alive() {
        trace!("Skipped pre-binding `{}`: parent lifetime is over", location);
        return Ok(());
    }
    let nested = definition.lifetime().clone();

    let registry = protocol.registry().clone();
    let inserted = registry
        .lock()
        .insert(id, location.clone(), parent.key(), entity.kind_name());
    let key = match inserted {
        Ok(key) => key,
        Err(err) => {
            definition.terminate();
            return Err(err.into());
        }
    };
    core.begin_pre_bind(
        location.clone(),
        key,
        parent.key(),
        protocol.clone(),
        definition,
    );

    let handle = entity.clone_handle();
    nested.on_termination(move || teardown(handle, registry, key));
    trace!("Pre-bound `{}` as {}", location, id);

    entity.pre_init(&nested, parent)?;

    let child_parent = entity.child_parent(BindParent::new(protocol, Some(key), location));
    let _scope = entity
        .children_need_binding_scope()
        .then(BindingScope::enter);
    for (child_name, child) in core.children() {
        pre_bind(child.as_ref(), &nested, &child_parent, &child_name)?;
    }
    Ok(())
}

pub fn bind(entity: &dyn Bindable) -> Result<(), RdError> {
    let core = entity.core();
    let (protocol, lifetime) = core.pre_bound_parts()?;

    entity.init(&lifetime, &protocol)?;
    {
        let _scope = entity
            .children_need_binding_scope()
            .then(BindingScope::enter);
        for (_, child) in core.children() {
            bind(child.as_ref())?;
        }
    }
    core.mark_bound();
    trace!("Bound `{}` as {}", core.location(), core.id());

    entity.post_init(&lifetime, &protocol)
}

/// Parent descriptor for children attached to an already pre-bound `entity`
pub fn child_parent_of(entity: &dyn Bindable) -> Option<BindParent> {
    let core = entity.core();
    let protocol = core.protocol()?;
    let own = BindParent::new(protocol, core.key(), core.location());
    Some(entity.child_parent(own))
}

/// Identifies, pre-binds and binds `child` below `parent` under `lifetime`, as done for values
/// held by properties and collections and for late extensions.
pub fn attach_child(
    parent: &dyn Bindable,
    lifetime: &Lifetime,
    child: &dyn Bindable,
    name: &str,
    id: RdId,
) -> Result<(), RdError> {
    let bind_parent = match child_parent_of(parent) {
        Some(bind_parent) => bind_parent,
        None => {
            return Err(BindError::NotBound {
                location: parent.location().to_string(),
            }
            .into())
        }
    };
    if child.rd_id().is_null() {
        identify(child, bind_parent.protocol().identities(), id)?;
    }
    let _scope = BindingScope::enter();
    pre_bind(child, lifetime, &bind_parent, name)?;
    if child.bind_state() == BindState::PreBound {
        bind(child)?;
    }
    Ok(())
}

fn teardown(entity: Box<dyn Bindable>, registry: Arc<Mutex<EntityRegistry>>, key: EntityKey) {
    entity.on_unbind();
    registry.lock().remove(key);
    let location = entity.core().reset_binding();
    trace!("Unbound `{}`", location);
}
