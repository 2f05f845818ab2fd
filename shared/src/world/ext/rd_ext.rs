use std::{fmt, sync::Arc};

use log::{debug, error, trace};
use parking_lot::Mutex;

use crate::{
    bindable_boilerplate,
    error::RdError,
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    protocol::{ExtCreated, Protocol},
    scheduler::Scheduler,
    serialization::intern_root::InternRoot,
    wire::Wire,
    world::{
        component::reactive_base::ReactiveBase,
        entity::{
            bindable::{BindParent, Bindable},
            error::BindError,
        },
        ext::{ext_state::ExtState, ext_wire::ExtWire},
        sync::entity_view::EntityView,
    },
};

/// Where the entities inside an extension run
#[derive(Clone)]
pub enum ExtThreading {
    /// On the parent protocol's scheduler
    Parent,
    /// On a scheduler of its own
    Dedicated(Arc<dyn Scheduler>),
}

impl fmt::Debug for ExtThreading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtThreading::Parent => f.write_str("Parent"),
            ExtThreading::Dedicated(scheduler) => {
                f.debug_tuple("Dedicated").field(&scheduler.name()).finish()
            }
        }
    }
}

struct Nested {
    protocol: Arc<Protocol>,
    wire: Arc<ExtWire>,
}

struct ExtInner {
    base: ReactiveBase,
    threading: ExtThreading,
    declared_fingerprint: Mutex<Option<i64>>,
    intern_domain: Mutex<Option<String>>,
    nested: Mutex<Option<Nested>>,
}

/// Entity hosting a nested protocol.
///
/// When it binds, the extension creates a protocol of its own (sharing identities and
/// serializers with the parent) whose wire holds back all traffic until both sides have
/// exchanged a handshake: `i32 state · i64 fingerprint`. Sides whose fingerprints differ never
/// connect; the extension is reported in the parent protocol's out-of-sync set instead.
#[derive(Clone)]
pub struct RdExt {
    inner: Arc<ExtInner>,
}

impl Default for RdExt {
    fn default() -> Self {
        Self::new(ExtThreading::Parent)
    }
}

impl RdExt {
    pub fn new(threading: ExtThreading) -> Self {
        Self {
            inner: Arc::new(ExtInner {
                base: ReactiveBase::new(),
                threading,
                declared_fingerprint: Mutex::new(None),
                intern_domain: Mutex::new(None),
                nested: Mutex::new(None),
            }),
        }
    }

    /// Uses `fingerprint` instead of the one derived from the declared fields
    pub fn with_fingerprint(self, fingerprint: i64) -> Self {
        *self.inner.declared_fingerprint.lock() = Some(fingerprint);
        self
    }

    /// Gives the nested protocol an intern domain of its own
    pub fn with_intern_domain(self, domain: &str) -> Self {
        *self.inner.intern_domain.lock() = Some(domain.to_string());
        self
    }

    pub fn with_field(self, name: &str, field: &dyn Bindable) -> Result<Self, BindError> {
        self.add_field(name, field)?;
        Ok(self)
    }

    pub fn add_field(&self, name: &str, field: &dyn Bindable) -> Result<(), BindError> {
        self.inner.base.core.add_child(name, field.clone_handle())
    }

    pub fn field<T: Bindable + Clone>(&self, name: &str) -> Result<T, BindError> {
        self.inner.base.core.child_as::<T>(name)
    }

    pub fn threading(&self) -> &ExtThreading {
        &self.inner.threading
    }

    /// The declared fingerprint, or a hash over field names and kinds in declaration order
    pub fn fingerprint(&self) -> i64 {
        if let Some(fingerprint) = *self.inner.declared_fingerprint.lock() {
            return fingerprint;
        }
        self.inner
            .base
            .core
            .children()
            .iter()
            .fold(RdId::NULL, |acc, (name, child)| {
                acc.mix(name).mix(child.kind_name())
            })
            .value()
    }

    pub fn nested_protocol(&self) -> Option<Arc<Protocol>> {
        self.inner
            .nested
            .lock()
            .as_ref()
            .map(|nested| nested.protocol.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.nested_wire()
            .map(|wire| wire.connected().value().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Messages held back until the handshake completes
    pub fn queued(&self) -> usize {
        self.nested_wire().map(|wire| wire.queued()).unwrap_or(0)
    }

    fn nested_wire(&self) -> Option<Arc<ExtWire>> {
        self.inner
            .nested
            .lock()
            .as_ref()
            .map(|nested| nested.wire.clone())
    }

    fn send_state(&self, protocol: &Protocol, state: ExtState) -> Result<(), RdError> {
        let fingerprint = self.fingerprint();
        self.inner.base.send_with(protocol, &mut |_, writer| {
            writer.write_i32(state.ordinal());
            writer.write_i64(fingerprint);
            Ok(())
        })?;
        debug!(
            "ext `{}` ({}) :: sent {:?}, fingerprint {}",
            self.location(),
            self.rd_id(),
            state,
            fingerprint
        );
        Ok(())
    }

    fn on_state(&self, parent: &Protocol, state: ExtState, fingerprint: i64) -> Result<(), RdError> {
        debug!(
            "ext `{}` ({}) :: received {:?}, fingerprint {}",
            self.location(),
            self.rd_id(),
            state,
            fingerprint
        );
        let wire = match self.nested_wire() {
            Some(wire) => wire,
            None => return Ok(()),
        };

        if state == ExtState::Disconnected {
            wire.disconnect();
            return Ok(());
        }

        // answered even on mismatch so the counterpart learns about it too
        if state == ExtState::Ready {
            self.send_state(parent, ExtState::ReceivedCounterpart)?;
        }

        let own = self.fingerprint();
        if fingerprint != own {
            error!(
                "ext `{}` ({}) :: counterpart fingerprint {} does not match {}. The two sides declare different shapes; the extension stays disconnected",
                self.location(),
                self.rd_id(),
                fingerprint,
                own
            );
            parent.mark_out_of_sync(self.rd_id());
            return Ok(());
        }
        wire.connect();
        trace!("ext `{}` ({}) :: connected", self.location(), self.rd_id());
        Ok(())
    }
}

impl Bindable for RdExt {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Ext
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = Self::new(self.inner.threading.clone());
        *copy.inner.declared_fingerprint.lock() = *self.inner.declared_fingerprint.lock();
        *copy.inner.intern_domain.lock() = self.inner.intern_domain.lock().clone();
        for (name, child) in self.inner.base.core.children() {
            let _ = copy.inner.base.core.add_child(&name, child.deep_clone());
        }
        Box::new(copy)
    }

    fn children_need_binding_scope(&self) -> bool {
        true
    }

    fn pre_init(&self, lifetime: &Lifetime, parent: &BindParent) -> Result<(), RdError> {
        let parent_protocol = parent.protocol();
        let scheduler = match &self.inner.threading {
            ExtThreading::Parent => parent_protocol.scheduler().clone(),
            ExtThreading::Dedicated(scheduler) => scheduler.clone(),
        };
        let wire = ExtWire::new(parent_protocol.wire().clone(), scheduler.clone(), lifetime);
        let intern_domain = self.inner.intern_domain.lock().clone();
        let ctx = match &intern_domain {
            Some(domain) => parent_protocol
                .serialization_ctx()
                .with_intern_root(Arc::new(InternRoot::new(domain))),
            None => parent_protocol.serialization_ctx().clone(),
        };
        let location = self.location();
        let protocol = parent_protocol.nested(location.clone(), scheduler, wire.clone(), lifetime, ctx);
        *self.inner.nested.lock() = Some(Nested { protocol, wire });

        let nested = self.inner.clone();
        lifetime.on_termination(move || {
            nested.nested.lock().take();
        });

        parent_protocol.ext_created().fire(&ExtCreated {
            id: self.rd_id(),
            location,
        });
        Ok(())
    }

    fn child_parent(&self, own: BindParent) -> BindParent {
        match self.nested_protocol() {
            Some(protocol) => BindParent::new(protocol, own.key(), own.location().clone()),
            None => own,
        }
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let ext = self.clone();
        let parent = protocol.clone();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |_, reader| {
                let state = ExtState::from_ordinal(reader.read_i32()?)?;
                let fingerprint = reader.read_i64()?;
                ext.on_state(&parent, state, fingerprint)
            })
    }

    fn post_init(&self, _lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        self.send_state(protocol, ExtState::Ready)
    }

    fn on_unbind(&self) {
        if let Some(wire) = self.nested_wire() {
            wire.disconnect();
        }
        if let Some(protocol) = self.inner.base.core.protocol() {
            if let Err(err) = self.send_state(&protocol, ExtState::Disconnected) {
                debug!("ext `{}` :: could not announce disconnect: {}", self.location(), err);
            }
        }
    }
}

impl fmt::Debug for RdExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdExt")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("threading", &self.inner.threading)
            .field("connected", &self.is_connected())
            .finish()
    }
}
