use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{
    identity::rd_id::RdId,
    lifetime::lifetime::{Lifetime, LifetimeDefinition},
    protocol::{registry::EntityKey, Protocol},
    scheduler::Scheduler,
    world::entity::{
        bind_state::BindState,
        bindable::{downcast, Bindable},
        error::BindError,
        location::Location,
    },
};

struct Binding {
    state: BindState,
    location: Location,
    key: Option<EntityKey>,
    parent: Option<EntityKey>,
    protocol: Option<Arc<Protocol>>,
    lifetime: Option<LifetimeDefinition>,
}

impl Default for Binding {
    fn default() -> Self {
        Self {
            state: BindState::NotBound,
            location: Location::unbound(),
            key: None,
            parent: None,
            protocol: None,
            lifetime: None,
        }
    }
}

/// Identity, binding state and named children of one entity. Every [`Bindable`] owns one.
#[derive(Default)]
pub struct BindableCore {
    id: Mutex<RdId>,
    binding: Mutex<Binding>,
    children: RwLock<Vec<(String, Box<dyn Bindable>)>>,
}

impl BindableCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> RdId {
        *self.id.lock()
    }

    pub fn state(&self) -> BindState {
        self.binding.lock().state
    }

    pub fn location(&self) -> Location {
        self.binding.lock().location.clone()
    }

    pub fn key(&self) -> Option<EntityKey> {
        self.binding.lock().key
    }

    pub fn parent_key(&self) -> Option<EntityKey> {
        self.binding.lock().parent
    }

    /// The protocol this entity is (pre-)bound in
    pub fn protocol(&self) -> Option<Arc<Protocol>> {
        self.binding.lock().protocol.clone()
    }

    /// Lifetime of the current binding
    pub fn bind_lifetime(&self) -> Option<Lifetime> {
        self.binding
            .lock()
            .lifetime
            .as_ref()
            .map(|definition| definition.lifetime().clone())
    }

    pub fn bound_protocol(&self) -> Result<Arc<Protocol>, BindError> {
        let binding = self.binding.lock();
        match (&binding.protocol, binding.state) {
            (Some(protocol), BindState::Bound) => Ok(protocol.clone()),
            _ => Err(BindError::NotBound {
                location: binding.location.to_string(),
            }),
        }
    }

    /// Rejects local changes made off the protocol's scheduler unless `is_async`
    pub fn check_threading(&self, is_async: bool) -> Result<(), BindError> {
        if is_async {
            return Ok(());
        }
        let binding = self.binding.lock();
        if binding.state != BindState::Bound {
            return Ok(());
        }
        let scheduler: Option<&Arc<dyn Scheduler>> =
            binding.protocol.as_ref().map(|protocol| protocol.scheduler());
        match scheduler {
            Some(scheduler) if !scheduler.is_active() => Err(BindError::WrongThread {
                location: binding.location.to_string(),
                scheduler: scheduler.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn add_child(&self, name: &str, child: Box<dyn Bindable>) -> Result<(), BindError> {
        let mut children = self.children.write();
        if children.iter().any(|(existing, _)| existing == name) {
            return Err(BindError::DuplicateChild {
                location: self.location().to_string(),
                name: name.to_string(),
            });
        }
        children.push((name.to_string(), child));
        Ok(())
    }

    pub fn child(&self, name: &str) -> Option<Box<dyn Bindable>> {
        self.children
            .read()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, child)| child.clone_handle())
    }

    pub fn child_as<T: Bindable + Clone>(&self, name: &str) -> Result<T, BindError> {
        let child = self.child(name).ok_or_else(|| BindError::NoSuchChild {
            location: self.location().to_string(),
            name: name.to_string(),
        })?;
        downcast::<T>(child.as_ref()).ok_or_else(|| BindError::ChildTypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Snapshot of the children in insertion order
    pub fn children(&self) -> Vec<(String, Box<dyn Bindable>)> {
        self.children
            .read()
            .iter()
            .map(|(name, child)| (name.clone(), child.clone_handle()))
            .collect()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(crate) fn assign_id(&self, id: RdId) -> Result<(), BindError> {
        let mut current = self.id.lock();
        if !current.is_null() {
            return Err(BindError::AlreadyIdentified {
                location: self.location().to_string(),
                id: *current,
            });
        }
        *current = id;
        Ok(())
    }

    pub(crate) fn begin_pre_bind(
        &self,
        location: Location,
        key: EntityKey,
        parent: Option<EntityKey>,
        protocol: Arc<Protocol>,
        lifetime: LifetimeDefinition,
    ) {
        let mut binding = self.binding.lock();
        binding.state = BindState::PreBound;
        binding.location = location;
        binding.key = Some(key);
        binding.parent = parent;
        binding.protocol = Some(protocol);
        binding.lifetime = Some(lifetime);
    }

    /// Protocol and lifetime of a pre-bound entity
    pub(crate) fn pre_bound_parts(&self) -> Result<(Arc<Protocol>, Lifetime), BindError> {
        let binding = self.binding.lock();
        let wrong_state = || BindError::WrongBindState {
            location: binding.location.to_string(),
            expected: BindState::PreBound,
            actual: binding.state,
        };
        if binding.state != BindState::PreBound {
            return Err(wrong_state());
        }
        match (&binding.protocol, &binding.lifetime) {
            (Some(protocol), Some(lifetime)) => Ok((protocol.clone(), lifetime.lifetime().clone())),
            _ => Err(wrong_state()),
        }
    }

    pub(crate) fn mark_bound(&self) {
        self.binding.lock().state = BindState::Bound;
    }

    /// Back to the unbound placeholders. Returns the location the entity had.
    pub(crate) fn reset_binding(&self) -> Location {
        let previous = std::mem::take(&mut *self.binding.lock());
        *self.id.lock() = RdId::NULL;
        previous.location
    }

    pub(crate) fn terminate_binding(&self) -> bool {
        let definition = self.binding.lock().lifetime.take();
        match definition {
            Some(definition) => definition.terminate(),
            None => false,
        }
    }
}
