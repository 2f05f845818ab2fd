use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc,
    },
};

use log::{error, trace, warn};
use ripple_serde::{ByteReader, ByteWriter, Serde};

use crate::{
    bindable_boilerplate,
    error::RdError,
    lifetime::{lifetime::Lifetime, sequential_lifetimes::SequentialLifetimes},
    protocol::Protocol,
    reactive::property::Property,
    serialization::{
        error::SerializationError,
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::reactive_base::ReactiveBase,
        entity::{
            bindable::{downcast, Bindable},
            lifecycle,
            rd_value::RdValue,
        },
        sync::{
            entity_view::{EntityView, Synchronizable},
            error::SyncError,
            model_synchronizer::{mismatch, ModelSynchronizer, SyncGuard},
        },
    },
};

struct PropertyInner<T> {
    base: ReactiveBase,
    property: Property<T>,
    serializer: Arc<dyn ValueSerializer<T>>,
    master: AtomicBool,
    master_version: AtomicI32,
    default_value_changed: AtomicBool,
}

/// Replicated observable value.
///
/// Payload: `i32 master_version · value`. A master side bumps the version on every local change
/// and ignores incoming values older than what it has already sent; both sides are masters
/// unless one opts out with [`RdProperty::slave`]. A value set before binding is sent when the
/// property binds.
pub struct RdProperty<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for RdProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RdValue + Serde> RdProperty<T> {
    pub fn new(value: T) -> Self {
        Self::with_serializer(Some(value), static_serializer::<T>())
    }

    pub fn empty() -> Self {
        Self::with_serializer(None, static_serializer::<T>())
    }
}

impl<T: RdValue> RdProperty<T> {
    pub fn with_serializer(value: Option<T>, serializer: Arc<dyn ValueSerializer<T>>) -> Self {
        let property = match value {
            Some(value) => Property::new(value),
            None => Property::empty(),
        };
        Self {
            inner: Arc::new(PropertyInner {
                base: ReactiveBase::new(),
                property,
                serializer,
                master: AtomicBool::new(true),
                master_version: AtomicI32::new(0),
                default_value_changed: AtomicBool::new(false),
            }),
        }
    }

    /// Gives up mastership: remote values are always accepted
    pub fn slave(self) -> Self {
        self.inner.master.store(false, Ordering::Release);
        self
    }

    pub fn is_master(&self) -> bool {
        self.inner.master.load(Ordering::Acquire)
    }

    pub fn master_version(&self) -> i32 {
        self.inner.master_version.load(Ordering::Acquire)
    }

    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    pub fn value(&self) -> Option<T> {
        self.inner.property.value()
    }

    pub fn has_value(&self) -> bool {
        self.inner.property.has_value()
    }

    /// Stores `value`, sends it when bound and notifies local listeners. Setting the current
    /// value again does nothing and returns `false`.
    pub fn set(&self, value: T) -> Result<bool, RdError> {
        self.inner.base.check_threading()?;

        let mut outcome = Ok(());
        let changed = self.inner.property.set_then(value, |value| {
            outcome = self.on_local_change(value);
        });
        outcome.map(|_| changed)
    }

    fn on_local_change(&self, value: &T) -> Result<(), RdError> {
        let protocol = match self.inner.base.core.bound_protocol() {
            Ok(protocol) => protocol,
            Err(_) => {
                self.inner.default_value_changed.store(true, Ordering::Release);
                return Ok(());
            }
        };
        self.send(&protocol, value)
    }

    fn send(&self, protocol: &Protocol, value: &T) -> Result<(), RdError> {
        let version = if self.is_master() {
            self.inner.master_version.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.master_version()
        };
        let serializer = self.inner.serializer.clone();
        self.inner.base.send_with(protocol, &mut |ctx, writer| {
            writer.write_i32(version);
            serializer.write(ctx, writer, value)
        })?;
        trace!(
            "property `{}` ({}):: ver = {}, value = {:?}",
            self.location(),
            self.rd_id(),
            version,
            value
        );
        Ok(())
    }

    /// Replays the current value, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.property.advise(lifetime, handler);
    }

    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, &T) + Send + Sync + 'static,
    {
        self.inner.property.view(lifetime, handler);
    }

    fn receive(inner: &PropertyInner<T>, version: i32, value: T, location: &str) {
        let master_version = inner.master_version.load(Ordering::Acquire);
        let master = inner.master.load(Ordering::Acquire);
        if master && version < master_version {
            warn!(
                "property `{}` ({}):: oldver = {}, newver = {}, value = {:?} >> REJECTED",
                location,
                inner.base.id(),
                master_version,
                version,
                value
            );
            return;
        }
        trace!(
            "property `{}` ({}):: oldver = {}, newver = {}, value = {:?}",
            location,
            inner.base.id(),
            master_version,
            version,
            value
        );
        inner.master_version.store(version, Ordering::Release);
        inner.property.set(value);
    }
}

impl<T: RdValue> Bindable for RdProperty<T> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Property(self)
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = RdProperty::with_serializer(
            self.value().map(|value| value.deep_clone()),
            self.inner.serializer.clone(),
        );
        copy.inner.master.store(self.is_master(), Ordering::Release);
        Box::new(copy)
    }

    /// `bool has_value · i32 master_version · value`
    fn write_state(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        let value = self.value();
        writer.write_bool(value.is_some());
        writer.write_i32(self.master_version());
        match value {
            Some(value) => self.inner.serializer.write(ctx, writer, &value),
            None => Ok(()),
        }
    }

    fn read_state(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), SerializationError> {
        let has_value = reader.read_bool()?;
        let version = reader.read_i32()?;
        self.inner.master_version.store(version, Ordering::Release);
        if has_value {
            let value = self.inner.serializer.read(ctx, reader)?;
            self.inner.property.set(value);
        }
        Ok(())
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let inner = self.inner.clone();
        let location = self.location().to_string();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                let version = reader.read_i32()?;
                let value = inner.serializer.read(ctx, reader)?;
                Self::receive(&inner, version, value, &location);
                Ok(())
            })?;

        if self.inner.default_value_changed.swap(false, Ordering::AcqRel) {
            if let Some(value) = self.value() {
                self.send(protocol, &value)?;
            }
        }

        // entity values live under a lifetime that ends when they are replaced
        let owner = self.clone();
        let identities = protocol.identities().clone();
        self.view(lifetime, move |value_lifetime, value| {
            if let Some(entity) = value.as_bindable() {
                let id = match entity.rd_id() {
                    id if id.is_null() => identities.next(owner.rd_id()),
                    id => id,
                };
                if let Err(err) = lifecycle::attach_child(&owner, value_lifetime, entity, "$", id) {
                    error!("Failed to bind value of `{}`: {}", owner.location(), err);
                }
            }
        });
        Ok(())
    }
}

impl<T: RdValue> Synchronizable for RdProperty<T> {
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError> {
        let other_property =
            downcast::<RdProperty<T>>(other).ok_or_else(|| mismatch(self, other))?;
        let guard = SyncGuard::new();

        // the side that already has a value seeds the other
        let (seed, seeded) = if self.has_value() {
            (self.clone(), other_property.clone())
        } else {
            (other_property.clone(), self.clone())
        };
        pipe(lifetime, &seed, &seeded, &guard, *synchronizer, true);
        pipe(lifetime, &seeded, &seed, &guard, *synchronizer, false);
        Ok(())
    }
}

fn pipe<T: RdValue>(
    lifetime: &Lifetime,
    from: &RdProperty<T>,
    to: &RdProperty<T>,
    guard: &SyncGuard,
    synchronizer: ModelSynchronizer,
    replay: bool,
) {
    let to = to.clone();
    let guard = guard.clone();
    let values = SequentialLifetimes::new(lifetime);
    let handler = move |value: &T| {
        guard.run(|| {
            let value_lifetime = values.next();
            let mirrored = synchronizer.mirror_value(&value_lifetime, value);
            if let Err(err) = to.set(mirrored) {
                error!("Failed to mirror value onto `{}`: {}", to.location(), err);
            }
        });
    };
    if replay {
        from.advise(lifetime, handler);
    } else {
        from.inner.property.change().advise(lifetime, handler);
    }
}

impl<T: RdValue> fmt::Debug for RdProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdProperty")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("master_version", &self.master_version())
            .field("value", &self.value())
            .finish()
    }
}
