use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    },
};

use log::{error, trace, warn};
use parking_lot::Mutex;
use ripple_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

use crate::{
    bindable_boilerplate,
    error::RdError,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    reactive::map::{MapEvent, ViewableMap},
    serialization::{
        error::SerializationError,
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::{change_guard::LocalChange, reactive_base::ReactiveBase},
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

/// Version carried by changes made on a slave side
const UNVERSIONED: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapOp {
    Add = 0,
    Update = 1,
    Remove = 2,
    Ack = 3,
}

impl MapOp {
    fn from_ordinal(ordinal: i32) -> Result<Self, SerdeErr> {
        match ordinal {
            0 => Ok(MapOp::Add),
            1 => Ok(MapOp::Update),
            2 => Ok(MapOp::Remove),
            3 => Ok(MapOp::Ack),
            other => Err(SerdeErr::InvalidOrdinal {
                enum_name: "MapOp",
                ordinal: other,
            }),
        }
    }

    fn carries_value(self) -> bool {
        matches!(self, MapOp::Add | MapOp::Update)
    }
}

struct MapInner<K, V> {
    base: ReactiveBase,
    map: ViewableMap<K, V>,
    key_serializer: Arc<dyn ValueSerializer<K>>,
    value_serializer: Arc<dyn ValueSerializer<V>>,
    master: AtomicBool,
    next_version: AtomicI64,
    // keys changed locally by a master and not yet acknowledged
    pending: Mutex<Vec<(K, i64)>>,
    local_change: LocalChange,
}

/// Replicated map.
///
/// Payload: `i32 op · i64 version · key · value` (no value for `Remove` and `Ack`).
///
/// | side   | local change                        | remote change                          |
/// |--------|-------------------------------------|----------------------------------------|
/// | master | versioned, key pending until acked  | slave changes to pending keys rejected |
/// | slave  | sent unversioned                    | applied, then acknowledged             |
///
/// Maps are slaves unless [`RdMap::master`] is called; exactly one side of a pair should be
/// master.
pub struct RdMap<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> Clone for RdMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: RdValue + Serde, V: RdValue + Serde> RdMap<K, V> {
    pub fn new() -> Self {
        Self::with_serializers(static_serializer::<K>(), static_serializer::<V>())
    }
}

impl<K: RdValue + Serde, V: RdValue + Serde> Default for RdMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RdValue, V: RdValue> RdMap<K, V> {
    pub fn with_serializers(
        key_serializer: Arc<dyn ValueSerializer<K>>,
        value_serializer: Arc<dyn ValueSerializer<V>>,
    ) -> Self {
        Self {
            inner: Arc::new(MapInner {
                base: ReactiveBase::new(),
                map: ViewableMap::new(),
                key_serializer,
                value_serializer,
                master: AtomicBool::new(false),
                next_version: AtomicI64::new(0),
                pending: Mutex::new(Vec::new()),
                local_change: LocalChange::default(),
            }),
        }
    }

    pub fn master(self) -> Self {
        self.inner.master.store(true, Ordering::Release);
        self
    }

    pub fn is_master(&self) -> bool {
        self.inner.master.load(Ordering::Acquire)
    }

    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.map.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.map.contains_key(key)
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner.map.entries()
    }

    /// Keys whose local change has not been acknowledged yet
    pub fn pending_keys(&self) -> Vec<K> {
        self.inner
            .pending
            .lock()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Inserts or replaces, returning the previous value
    pub fn set(&self, key: K, value: V) -> Result<Option<V>, RdError> {
        self.local(|map| map.set(key, value))
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, RdError> {
        self.local(|map| map.remove(key))
    }

    pub fn clear(&self) -> Result<(), RdError> {
        self.local(|map| map.clear())
    }

    /// Replays the current entries as `Add` events, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&MapEvent<K, V>) + Send + Sync + 'static,
    {
        self.inner.map.advise(lifetime, handler);
    }

    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, &K, &V) + Send + Sync + 'static,
    {
        self.inner.map.view(lifetime, handler);
    }

    fn local<R>(&self, change: impl FnOnce(&ViewableMap<K, V>) -> R) -> Result<R, RdError> {
        self.inner.base.check_threading()?;
        let _local = self.inner.local_change.enter();
        Ok(change(&self.inner.map))
    }

    fn send_event(inner: &MapInner<K, V>, protocol: &Protocol, event: &MapEvent<K, V>) {
        let (op, key, value) = match event {
            MapEvent::Add { key, value } => (MapOp::Add, key, Some(value)),
            MapEvent::Update { key, new_value, .. } => (MapOp::Update, key, Some(new_value)),
            MapEvent::Remove { key, .. } => (MapOp::Remove, key, None),
        };
        let version = if inner.master.load(Ordering::Acquire) {
            let version = inner.next_version.fetch_add(1, Ordering::AcqRel) + 1;
            let mut pending = inner.pending.lock();
            pending.retain(|(pending_key, _)| pending_key != key);
            pending.push((key.clone(), version));
            version
        } else {
            UNVERSIONED
        };
        Self::send_op(inner, protocol, op, version, key, value);
    }

    fn send_op(
        inner: &MapInner<K, V>,
        protocol: &Protocol,
        op: MapOp,
        version: i64,
        key: &K,
        value: Option<&V>,
    ) {
        let key_serializer = inner.key_serializer.clone();
        let value_serializer = inner.value_serializer.clone();
        let sent = inner.base.send_with(protocol, &mut |ctx, writer| {
            writer.write_i32(op as i32);
            writer.write_i64(version);
            key_serializer.write(ctx, writer, key)?;
            if let Some(value) = value {
                value_serializer.write(ctx, writer, value)?;
            }
            Ok(())
        });
        match sent {
            Ok(()) => trace!(
                "map `{}` ({}) :: {:?} :: key = {:?} :: version = {}",
                inner.base.core.location(),
                inner.base.id(),
                op,
                key,
                version
            ),
            Err(err) => error!(
                "Failed to send map change of `{}`: {}",
                inner.base.core.location(),
                err
            ),
        }
    }

    fn receive(
        inner: &MapInner<K, V>,
        protocol: &Protocol,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), RdError> {
        let op = MapOp::from_ordinal(reader.read_i32()?)?;
        let version = reader.read_i64()?;
        let key = inner.key_serializer.read(ctx, reader)?;
        let value = if op.carries_value() {
            Some(inner.value_serializer.read(ctx, reader)?)
        } else {
            None
        };
        let location = inner.base.core.location();

        if op == MapOp::Ack {
            let mut pending = inner.pending.lock();
            let acknowledged = pending
                .iter()
                .position(|(pending_key, pending_version)| {
                    *pending_key == key && *pending_version == version
                });
            if let Some(position) = acknowledged {
                pending.remove(position);
            }
            trace!(
                "map `{}` ({}) :: ACK :: key = {:?} :: version = {}",
                location,
                inner.base.id(),
                key,
                version
            );
            return Ok(());
        }

        let versioned = version != UNVERSIONED;
        if !versioned && inner.master.load(Ordering::Acquire) {
            let is_pending = inner
                .pending
                .lock()
                .iter()
                .any(|(pending_key, _)| *pending_key == key);
            if is_pending {
                warn!(
                    "map `{}` ({}) :: {:?} :: key = {:?} >> REJECTED, local change not acknowledged",
                    location,
                    inner.base.id(),
                    op,
                    key
                );
                return Ok(());
            }
        }

        trace!(
            "map `{}` ({}) :: {:?} :: key = {:?} :: version = {} :: value = {:?}",
            location,
            inner.base.id(),
            op,
            key,
            version,
            value
        );
        match value {
            Some(value) => {
                inner.map.set(key.clone(), value);
            }
            None => {
                inner.map.remove(&key);
            }
        }

        if versioned {
            Self::send_op(inner, protocol, MapOp::Ack, version, &key, None);
        }
        Ok(())
    }
}

impl<K: RdValue, V: RdValue> Bindable for RdMap<K, V> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Map(self)
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = RdMap::with_serializers(
            self.inner.key_serializer.clone(),
            self.inner.value_serializer.clone(),
        );
        copy.inner.master.store(self.is_master(), Ordering::Release);
        for (key, value) in self.entries() {
            copy.inner.map.set(key, value.deep_clone());
        }
        Box::new(copy)
    }

    /// `i32 count · (key · value)*`
    fn write_state(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        let entries = self.entries();
        writer.write_i32(entries.len() as i32);
        for (key, value) in &entries {
            self.inner.key_serializer.write(ctx, writer, key)?;
            self.inner.value_serializer.write(ctx, writer, value)?;
        }
        Ok(())
    }

    fn read_state(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), SerializationError> {
        for _ in 0..reader.read_length()? {
            let key = self.inner.key_serializer.read(ctx, reader)?;
            let value = self.inner.value_serializer.read(ctx, reader)?;
            self.inner.map.set(key, value);
        }
        Ok(())
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let sender = self.inner.clone();
        let sending_protocol = protocol.clone();
        self.inner.map.change().advise(lifetime, move |event| {
            if sender.local_change.is_active() {
                Self::send_event(&sender, &sending_protocol, event);
            }
        });

        let receiver = self.inner.clone();
        let acking_protocol = protocol.clone();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                Self::receive(&receiver, &acking_protocol, ctx, reader)
            })?;

        let owner = self.clone();
        let identities = protocol.identities().clone();
        self.view(lifetime, move |entry_lifetime, key, value| {
            if let Some(entity) = value.as_bindable() {
                let id = match entity.rd_id() {
                    id if id.is_null() => identities.next(owner.rd_id()),
                    id => id,
                };
                let name = format!("[{:?}]", key);
                if let Err(err) = lifecycle::attach_child(&owner, entry_lifetime, entity, &name, id) {
                    error!("Failed to bind entry of `{}`: {}", owner.location(), err);
                }
            }
        });
        Ok(())
    }
}

impl<K: RdValue, V: RdValue> Synchronizable for RdMap<K, V> {
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError> {
        let other_map = downcast::<RdMap<K, V>>(other).ok_or_else(|| mismatch(self, other))?;
        let guard = SyncGuard::new();
        let (seed, seeded) = if self.is_empty() && !other_map.is_empty() {
            (other_map, self.clone())
        } else {
            (self.clone(), other_map)
        };
        pipe(lifetime, &seed, &seeded, &guard, *synchronizer, true);

        // keys only the seeded side holds flow back without echoing
        guard.run(|| {
            for (key, value) in seeded.entries() {
                if seed.contains_key(&key) {
                    continue;
                }
                let mirrored = synchronizer.mirror_value(lifetime, &value);
                if let Err(err) = seed.set(key, mirrored) {
                    error!("Failed to mirror map entry onto `{}`: {}", seed.location(), err);
                }
            }
        });
        pipe(lifetime, &seeded, &seed, &guard, *synchronizer, false);
        Ok(())
    }
}

fn pipe<K: RdValue, V: RdValue>(
    lifetime: &Lifetime,
    from: &RdMap<K, V>,
    to: &RdMap<K, V>,
    guard: &SyncGuard,
    synchronizer: ModelSynchronizer,
    replay: bool,
) {
    let to = to.clone();
    let guard = guard.clone();
    let entry_lifetime = lifetime.clone();
    let handler = move |event: &MapEvent<K, V>| {
        guard.run(|| {
            let outcome = match event {
                MapEvent::Add { key, value }
                | MapEvent::Update {
                    key,
                    new_value: value,
                    ..
                } => {
                    let mirrored = synchronizer.mirror_value(&entry_lifetime, value);
                    to.set(key.clone(), mirrored)
                }
                MapEvent::Remove { key, .. } => to.remove(key),
            };
            if let Err(err) = outcome {
                error!("Failed to mirror map change onto `{}`: {}", to.location(), err);
            }
        });
    };
    if replay {
        from.advise(lifetime, handler);
    } else {
        from.inner.map.change().advise(lifetime, handler);
    }
}

impl<K: RdValue, V: RdValue> fmt::Debug for RdMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdMap")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("master", &self.is_master())
            .field("entries", &self.entries())
            .finish()
    }
}
