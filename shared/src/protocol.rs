use std::{fmt, sync::Arc};

use log::debug;
use parking_lot::Mutex;

use crate::{
    error::RdError,
    identity::{
        identities::{IdKind, Identities},
        rd_id::RdId,
    },
    lifetime::lifetime::Lifetime,
    reactive::{set::ViewableSet, signal::Signal},
    scheduler::Scheduler,
    serialization::{
        intern_root::InternRoot, polymorphic::Polymorphic, serialization_ctx::SerializationCtx,
        serializers::Serializers,
    },
    wire::Wire,
    world::entity::{
        bindable::{BindParent, Bindable},
        error::BindError,
        location::Location,
    },
};

pub mod error;
pub mod registry;

pub use error::ProtocolError;
use registry::EntityRegistry;

/// Fired when an extension creates its nested protocol
#[derive(Debug, Clone, PartialEq)]
pub struct ExtCreated {
    pub id: RdId,
    pub location: Location,
}

// Protocol
/// Root of one synchronization domain: identities, serializers, scheduler and wire, plus the
/// registry of entities bound under it.
pub struct Protocol {
    name: String,
    location: Location,
    identities: Arc<Identities>,
    serializers: Arc<Serializers>,
    serialization_ctx: SerializationCtx,
    scheduler: Arc<dyn Scheduler>,
    wire: Arc<dyn Wire>,
    lifetime: Lifetime,
    registry: Arc<Mutex<EntityRegistry>>,
    out_of_sync: ViewableSet<RdId>,
    ext_created: Signal<ExtCreated>,
}

impl Protocol {
    pub fn builder() -> ProtocolBuilder {
        ProtocolBuilder::default()
    }

    /// A protocol for the inside of an extension. Identities, serializers and the entity
    /// registry are shared with `self`; scheduler, wire and lifetime are the extension's own.
    pub fn nested(
        &self,
        location: Location,
        scheduler: Arc<dyn Scheduler>,
        wire: Arc<dyn Wire>,
        lifetime: &Lifetime,
        serialization_ctx: SerializationCtx,
    ) -> Arc<Protocol> {
        Arc::new(Protocol {
            name: location.to_string(),
            location,
            identities: self.identities.clone(),
            serializers: self.serializers.clone(),
            serialization_ctx,
            scheduler,
            wire,
            lifetime: lifetime.clone(),
            registry: self.registry.clone(),
            out_of_sync: ViewableSet::new(),
            ext_created: self.ext_created.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn identities(&self) -> &Arc<Identities> {
        &self.identities
    }

    pub fn serializers(&self) -> &Arc<Serializers> {
        &self.serializers
    }

    pub fn serialization_ctx(&self) -> &SerializationCtx {
        &self.serialization_ctx
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn wire(&self) -> &Arc<dyn Wire> {
        &self.wire
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub(crate) fn registry(&self) -> &Arc<Mutex<EntityRegistry>> {
        &self.registry
    }

    pub fn is_registered(&self, id: RdId) -> bool {
        self.registry.lock().contains_id(id)
    }

    pub fn registered_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn location_of(&self, id: RdId) -> Option<Location> {
        self.registry.lock().location_of(id)
    }

    /// Ids of extensions whose counterpart declared a different shape
    pub fn out_of_sync(&self) -> &ViewableSet<RdId> {
        &self.out_of_sync
    }

    pub fn is_out_of_sync(&self, id: RdId) -> bool {
        self.out_of_sync.contains(&id)
    }

    pub(crate) fn mark_out_of_sync(&self, id: RdId) {
        self.out_of_sync.add(id);
    }

    pub fn ext_created(&self) -> &Signal<ExtCreated> {
        &self.ext_created
    }

    /// Binds `entity` under a well-known id in `(0, RdId::MAX_STATIC_ID)`, for the
    /// lifetime of the protocol
    pub fn bind_static(
        self: &Arc<Self>,
        entity: &dyn Bindable,
        name: &str,
        static_id: i64,
    ) -> Result<(), RdError> {
        let lifetime = self.lifetime.clone();
        self.bind_static_in(&lifetime, entity, name, static_id)
    }

    pub fn bind_static_in(
        self: &Arc<Self>,
        lifetime: &Lifetime,
        entity: &dyn Bindable,
        name: &str,
        static_id: i64,
    ) -> Result<(), RdError> {
        if static_id <= 0 || static_id >= RdId::MAX_STATIC_ID {
            return Err(BindError::StaticIdOutOfRange {
                id: static_id,
                max: RdId::MAX_STATIC_ID,
            }
            .into());
        }
        entity.identify(&self.identities, RdId::new(static_id))?;
        self.attach(lifetime, entity, name)
    }

    /// Binds `entity` under the id derived from `name`
    pub fn bind_top_level(
        self: &Arc<Self>,
        lifetime: &Lifetime,
        entity: &dyn Bindable,
        name: &str,
    ) -> Result<(), RdError> {
        entity.identify(&self.identities, self.identities.mix(RdId::NULL, name))?;
        self.attach(lifetime, entity, name)
    }

    fn attach(
        self: &Arc<Self>,
        lifetime: &Lifetime,
        entity: &dyn Bindable,
        name: &str,
    ) -> Result<(), RdError> {
        entity.pre_bind(lifetime, &BindParent::top_level(self), name)?;
        entity.bind()
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("kind", &self.identities.kind())
            .field("scheduler", &self.scheduler.name())
            .field("entities", &self.registered_count())
            .finish()
    }
}

// ProtocolBuilder
pub struct ProtocolBuilder {
    name: String,
    kind: IdKind,
    serializers: Arc<Serializers>,
    intern_roots: Vec<Arc<InternRoot>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    wire: Option<Arc<dyn Wire>>,
    lifetime: Lifetime,
    locked: bool,
}

impl Default for ProtocolBuilder {
    fn default() -> Self {
        Self {
            name: "protocol".to_string(),
            kind: IdKind::Client,
            serializers: Arc::new(Serializers::new()),
            intern_roots: Vec::new(),
            scheduler: None,
            wire: None,
            lifetime: Lifetime::eternal(),
            locked: false,
        }
    }
}

impl ProtocolBuilder {
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.check_lock();
        self.name = name.to_string();
        self
    }

    pub fn identity_kind(&mut self, kind: IdKind) -> &mut Self {
        self.check_lock();
        self.kind = kind;
        self
    }

    /// Shares an existing registry instead of the builder's own
    pub fn serializers(&mut self, serializers: Arc<Serializers>) -> &mut Self {
        self.check_lock();
        self.serializers = serializers;
        self
    }

    pub fn register<T: Polymorphic>(&mut self) -> &mut Self {
        self.check_lock();
        if let Err(err) = self.serializers.register::<T>() {
            panic!("{}", err);
        }
        self
    }

    pub fn intern_root(&mut self, root: Arc<InternRoot>) -> &mut Self {
        self.check_lock();
        self.intern_roots.push(root);
        self
    }

    pub fn scheduler(&mut self, scheduler: Arc<dyn Scheduler>) -> &mut Self {
        self.check_lock();
        self.scheduler = Some(scheduler);
        self
    }

    pub fn wire(&mut self, wire: Arc<dyn Wire>) -> &mut Self {
        self.check_lock();
        self.wire = Some(wire);
        self
    }

    pub fn lifetime(&mut self, lifetime: &Lifetime) -> &mut Self {
        self.check_lock();
        self.lifetime = lifetime.clone();
        self
    }

    // Non-panicking builder methods

    pub fn try_register<T: Polymorphic>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.serializers.register::<T>()?;
        Ok(self)
    }

    pub fn try_intern_root(&mut self, root: Arc<InternRoot>) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.intern_roots.push(root);
        Ok(self)
    }

    pub fn try_scheduler(&mut self, scheduler: Arc<dyn Scheduler>) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.scheduler = Some(scheduler);
        Ok(self)
    }

    pub fn try_wire(&mut self, wire: Arc<dyn Wire>) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.wire = Some(wire);
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    /// Checks if the builder is locked without panicking
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if the builder is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Result<Arc<Protocol>, ProtocolError> {
        let scheduler = self
            .scheduler
            .clone()
            .ok_or_else(|| ProtocolError::MissingScheduler {
                name: self.name.clone(),
            })?;
        let wire = self.wire.clone().ok_or_else(|| ProtocolError::MissingWire {
            name: self.name.clone(),
        })?;

        let identities = Arc::new(Identities::new(self.kind));
        let mut serialization_ctx =
            SerializationCtx::new(self.serializers.clone()).with_identities(identities.clone());
        for root in &self.intern_roots {
            serialization_ctx = serialization_ctx.with_intern_root(root.clone());
        }

        debug!("Protocol `{}` built ({:?})", self.name, self.kind);
        Ok(Arc::new(Protocol {
            name: self.name.clone(),
            location: Location::root(&self.name),
            identities,
            serializers: self.serializers.clone(),
            serialization_ctx,
            scheduler,
            wire,
            lifetime: self.lifetime.clone(),
            registry: Arc::new(Mutex::new(EntityRegistry::new())),
            out_of_sync: ViewableSet::new(),
            ext_created: Signal::new(),
        }))
    }
}
