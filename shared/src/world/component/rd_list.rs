use std::{
    fmt,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::{error, trace};
use ripple_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

use crate::{
    bindable_boilerplate,
    error::RdError,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    reactive::list::{ListEvent, ViewableList},
    serialization::{
        error::SerializationError,
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::{change_guard::LocalChange, error::ComponentError, reactive_base::ReactiveBase},
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

const VERSION_SHIFT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListOp {
    Add = 0,
    Update = 1,
    Remove = 2,
}

impl ListOp {
    fn from_ordinal(ordinal: i64) -> Result<Self, SerdeErr> {
        match ordinal {
            0 => Ok(ListOp::Add),
            1 => Ok(ListOp::Update),
            2 => Ok(ListOp::Remove),
            other => Err(SerdeErr::InvalidOrdinal {
                enum_name: "ListOp",
                ordinal: other as i32,
            }),
        }
    }
}

struct ListInner<T> {
    base: ReactiveBase,
    list: ViewableList<T>,
    serializer: Arc<dyn ValueSerializer<T>>,
    next_version: AtomicI64,
    local_change: LocalChange,
}

/// Replicated ordered list.
///
/// Payload: `i64 (version << 2 | op) · i32 index · value` (no value for `Remove`). Versions
/// count every change made to the list from either side, so a receiver that sees a gap knows
/// both sides modified it concurrently.
pub struct RdList<T> {
    inner: Arc<ListInner<T>>,
}

impl<T> Clone for RdList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RdValue + Serde> RdList<T> {
    pub fn new() -> Self {
        Self::with_serializer(static_serializer::<T>())
    }
}

impl<T: RdValue + Serde> Default for RdList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RdValue> RdList<T> {
    pub fn with_serializer(serializer: Arc<dyn ValueSerializer<T>>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                base: ReactiveBase::new(),
                list: ViewableList::new(),
                serializer,
                next_version: AtomicI64::new(1),
                local_change: LocalChange::default(),
            }),
        }
    }

    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.list.get(index)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.list.to_vec()
    }

    pub fn add(&self, value: T) -> Result<(), RdError> {
        self.local(|list| list.add(value))
    }

    /// Returns `false` when `index` is past the end
    pub fn insert(&self, index: usize, value: T) -> Result<bool, RdError> {
        self.local(|list| list.insert(index, value))
    }

    pub fn set(&self, index: usize, value: T) -> Result<Option<T>, RdError> {
        self.local(|list| list.set(index, value))
    }

    pub fn remove_at(&self, index: usize) -> Result<Option<T>, RdError> {
        self.local(|list| list.remove_at(index))
    }

    pub fn clear(&self) -> Result<(), RdError> {
        self.local(|list| list.clear())
    }

    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&ListEvent<T>) + Send + Sync + 'static,
    {
        self.inner.list.advise(lifetime, handler);
    }

    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, usize, &T) + Send + Sync + 'static,
    {
        self.inner.list.view(lifetime, handler);
    }

    fn local<R>(&self, change: impl FnOnce(&ViewableList<T>) -> R) -> Result<R, RdError> {
        self.inner.base.check_threading()?;
        let _local = self.inner.local_change.enter();
        Ok(change(&self.inner.list))
    }

    fn send_event(inner: &ListInner<T>, protocol: &Protocol, event: &ListEvent<T>) {
        let (op, index, value) = match event {
            ListEvent::Add { index, value } => (ListOp::Add, *index, Some(value)),
            ListEvent::Update {
                index, new_value, ..
            } => (ListOp::Update, *index, Some(new_value)),
            ListEvent::Remove { index, .. } => (ListOp::Remove, *index, None),
        };
        let version = inner.next_version.fetch_add(1, Ordering::AcqRel);
        let serializer = inner.serializer.clone();
        let sent = inner.base.send_with(protocol, &mut |ctx, writer| {
            writer.write_i64((version << VERSION_SHIFT) | op as i64);
            writer.write_i32(index as i32);
            if let Some(value) = value {
                serializer.write(ctx, writer, value)?;
            }
            Ok(())
        });
        match sent {
            Ok(()) => trace!(
                "list `{}` ({}) :: {:?} :: key = {} :: version = {}",
                inner.base.core.location(),
                inner.base.id(),
                op,
                index,
                version
            ),
            Err(err) => error!(
                "Failed to send list change of `{}`: {}",
                inner.base.core.location(),
                err
            ),
        }
    }

    fn receive(
        inner: &ListInner<T>,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), RdError> {
        let header = reader.read_i64()?;
        let version = header >> VERSION_SHIFT;
        let op = ListOp::from_ordinal(header & ((1 << VERSION_SHIFT) - 1))?;
        let index = reader.read_i32()?;
        let value = match op {
            ListOp::Add | ListOp::Update => Some(inner.serializer.read(ctx, reader)?),
            ListOp::Remove => None,
        };
        let location = inner.base.core.location().to_string();
        trace!(
            "list `{}` ({}) :: {:?} :: key = {} :: version = {} :: value = {:?}",
            location,
            inner.base.id(),
            op,
            index,
            version,
            value
        );

        let expected = inner.next_version.load(Ordering::Acquire);
        if version != expected {
            return Err(ComponentError::VersionConflict {
                location,
                expected,
                received: version,
            }
            .into());
        }
        inner.next_version.fetch_add(1, Ordering::AcqRel);

        let out_of_range = || ComponentError::IndexOutOfRange {
            location: location.clone(),
            index,
            len: inner.list.len(),
        };
        let applied = match (op, value) {
            (ListOp::Add, Some(value)) if index < 0 => {
                inner.list.add(value);
                true
            }
            (ListOp::Add, Some(value)) => inner.list.insert(index as usize, value),
            (ListOp::Update, Some(value)) if index >= 0 => {
                inner.list.set(index as usize, value).is_some()
            }
            (ListOp::Remove, None) if index >= 0 => inner.list.remove_at(index as usize).is_some(),
            _ => false,
        };
        if !applied {
            return Err(out_of_range().into());
        }
        Ok(())
    }
}

impl<T: RdValue> Bindable for RdList<T> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::List(self)
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = RdList::with_serializer(self.inner.serializer.clone());
        for value in self.to_vec() {
            copy.inner.list.add(value.deep_clone());
        }
        Box::new(copy)
    }

    /// `i64 next_version · i32 count · values`
    fn write_state(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        let values = self.to_vec();
        writer.write_i64(self.inner.next_version.load(Ordering::Acquire));
        writer.write_i32(values.len() as i32);
        for value in &values {
            self.inner.serializer.write(ctx, writer, value)?;
        }
        Ok(())
    }

    fn read_state(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), SerializationError> {
        let version = reader.read_i64()?;
        let count = reader.read_length()?;
        self.inner.next_version.store(version, Ordering::Release);
        for _ in 0..count {
            let value = self.inner.serializer.read(ctx, reader)?;
            self.inner.list.add(value);
        }
        Ok(())
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let sender = self.inner.clone();
        let sending_protocol = protocol.clone();
        self.inner.list.change().advise(lifetime, move |event| {
            if sender.local_change.is_active() {
                Self::send_event(&sender, &sending_protocol, event);
            }
        });

        let receiver = self.inner.clone();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                Self::receive(&receiver, ctx, reader)
            })?;

        let owner = self.clone();
        let identities = protocol.identities().clone();
        self.view(lifetime, move |element_lifetime, index, value| {
            if let Some(entity) = value.as_bindable() {
                let id = match entity.rd_id() {
                    id if id.is_null() => identities.next(owner.rd_id()),
                    id => id,
                };
                let name = format!("[{}]", index);
                if let Err(err) = lifecycle::attach_child(&owner, element_lifetime, entity, &name, id)
                {
                    error!("Failed to bind element of `{}`: {}", owner.location(), err);
                }
            }
        });
        Ok(())
    }
}

impl<T: RdValue> Synchronizable for RdList<T> {
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError> {
        let other_list = downcast::<RdList<T>>(other).ok_or_else(|| mismatch(self, other))?;
        let guard = SyncGuard::new();
        let (seed, seeded) = if self.is_empty() && !other_list.is_empty() {
            (other_list, self.clone())
        } else {
            (self.clone(), other_list)
        };
        // the seed's contents replace whatever the other side held
        if let Err(err) = seeded.clear() {
            error!("Failed to clear `{}` before mirroring: {}", seeded.location(), err);
        }
        pipe(lifetime, &seed, &seeded, &guard, *synchronizer, true);
        pipe(lifetime, &seeded, &seed, &guard, *synchronizer, false);
        Ok(())
    }
}

fn pipe<T: RdValue>(
    lifetime: &Lifetime,
    from: &RdList<T>,
    to: &RdList<T>,
    guard: &SyncGuard,
    synchronizer: ModelSynchronizer,
    replay: bool,
) {
    let to = to.clone();
    let guard = guard.clone();
    let element_lifetime = lifetime.clone();
    let handler = move |event: &ListEvent<T>| {
        guard.run(|| {
            let outcome = match event {
                ListEvent::Add { index, value } => {
                    let mirrored = synchronizer.mirror_value(&element_lifetime, value);
                    to.insert(*index, mirrored).map(|_| ())
                }
                ListEvent::Update {
                    index, new_value, ..
                } => {
                    let mirrored = synchronizer.mirror_value(&element_lifetime, new_value);
                    to.set(*index, mirrored).map(|_| ())
                }
                ListEvent::Remove { index, .. } => to.remove_at(*index).map(|_| ()),
            };
            if let Err(err) = outcome {
                error!("Failed to mirror list change onto `{}`: {}", to.location(), err);
            }
        });
    };
    if replay {
        from.advise(lifetime, handler);
    } else {
        from.inner.list.change().advise(lifetime, handler);
    }
}

impl<T: RdValue> fmt::Debug for RdList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdList")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("items", &self.to_vec())
            .finish()
    }
}
