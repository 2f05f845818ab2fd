use std::{fmt, sync::Arc};

use log::{error, trace};
use ripple_serde::{ByteReader, ByteWriter, Serde, SerdeErr};

use crate::{
    bindable_boilerplate,
    error::RdError,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    reactive::set::{SetEvent, ViewableSet},
    serialization::{
        error::SerializationError,
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::{change_guard::LocalChange, reactive_base::ReactiveBase},
        entity::{
            bindable::{downcast, Bindable},
            rd_value::RdValue,
        },
        sync::{
            entity_view::{EntityView, Synchronizable},
            error::SyncError,
            model_synchronizer::{mismatch, ModelSynchronizer, SyncGuard},
        },
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Add = 0,
    Remove = 1,
    Clear = 2,
}

impl SetOp {
    fn from_ordinal(ordinal: i32) -> Result<Self, SerdeErr> {
        match ordinal {
            0 => Ok(SetOp::Add),
            1 => Ok(SetOp::Remove),
            2 => Ok(SetOp::Clear),
            other => Err(SerdeErr::InvalidOrdinal {
                enum_name: "SetOp",
                ordinal: other,
            }),
        }
    }
}

struct SetInner<T> {
    base: ReactiveBase,
    set: ViewableSet<T>,
    serializer: Arc<dyn ValueSerializer<T>>,
    local_change: LocalChange,
}

/// Replicated set of plain values.
///
/// Payload: `i32 op · value`, no value for `Clear`. Clearing sends a single `Clear` rather than
/// one `Remove` per element.
pub struct RdSet<T> {
    inner: Arc<SetInner<T>>,
}

impl<T> Clone for RdSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RdValue + Serde> RdSet<T> {
    pub fn new() -> Self {
        Self::with_serializer(static_serializer::<T>())
    }
}

impl<T: RdValue + Serde> Default for RdSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RdValue> RdSet<T> {
    pub fn with_serializer(serializer: Arc<dyn ValueSerializer<T>>) -> Self {
        Self {
            inner: Arc::new(SetInner {
                base: ReactiveBase::new(),
                set: ViewableSet::new(),
                serializer,
                local_change: LocalChange::default(),
            }),
        }
    }

    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.set.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.set.contains(value)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.set.to_vec()
    }

    /// Returns `false` when the value was already present
    pub fn add(&self, value: T) -> Result<bool, RdError> {
        self.inner.base.check_threading()?;
        let _local = self.inner.local_change.enter();
        Ok(self.inner.set.add(value))
    }

    pub fn remove(&self, value: &T) -> Result<bool, RdError> {
        self.inner.base.check_threading()?;
        let _local = self.inner.local_change.enter();
        Ok(self.inner.set.remove(value))
    }

    pub fn clear(&self) -> Result<(), RdError> {
        self.inner.base.check_threading()?;
        if self.is_empty() {
            return Ok(());
        }
        self.inner.set.clear();
        self.inner.base.send_if_bound(|_, writer| {
            writer.write_i32(SetOp::Clear as i32);
            Ok(())
        })?;
        Ok(())
    }

    /// Replays the current contents as `Add` events, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&SetEvent<T>) + Send + Sync + 'static,
    {
        self.inner.set.advise(lifetime, handler);
    }

    fn send_event(inner: &SetInner<T>, protocol: &Protocol, event: &SetEvent<T>) {
        let (op, value) = match event {
            SetEvent::Add(value) => (SetOp::Add, value),
            SetEvent::Remove(value) => (SetOp::Remove, value),
        };
        let serializer = inner.serializer.clone();
        let sent = inner.base.send_with(protocol, &mut |ctx, writer| {
            writer.write_i32(op as i32);
            serializer.write(ctx, writer, value)
        });
        match sent {
            Ok(()) => trace!(
                "set `{}` ({}) :: {:?} :: {:?}",
                inner.base.core.location(),
                inner.base.id(),
                op,
                value
            ),
            Err(err) => error!(
                "Failed to send set change of `{}`: {}",
                inner.base.core.location(),
                err
            ),
        }
    }

    fn receive(
        inner: &SetInner<T>,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), RdError> {
        let op = SetOp::from_ordinal(reader.read_i32()?)?;
        trace!(
            "set `{}` ({}) :: {:?} received",
            inner.base.core.location(),
            inner.base.id(),
            op
        );
        match op {
            SetOp::Add => {
                inner.set.add(inner.serializer.read(ctx, reader)?);
            }
            SetOp::Remove => {
                inner.set.remove(&inner.serializer.read(ctx, reader)?);
            }
            SetOp::Clear => inner.set.clear(),
        }
        Ok(())
    }
}

impl<T: RdValue> Bindable for RdSet<T> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Set(self)
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = RdSet::with_serializer(self.inner.serializer.clone());
        for value in self.to_vec() {
            copy.inner.set.add(value.deep_clone());
        }
        Box::new(copy)
    }

    fn write_state(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        let values = self.to_vec();
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
        for _ in 0..reader.read_length()? {
            let value = self.inner.serializer.read(ctx, reader)?;
            self.inner.set.add(value);
        }
        Ok(())
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let sender = self.inner.clone();
        let sending_protocol = protocol.clone();
        self.inner.set.change().advise(lifetime, move |event| {
            if sender.local_change.is_active() {
                Self::send_event(&sender, &sending_protocol, event);
            }
        });

        let receiver = self.inner.clone();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                Self::receive(&receiver, ctx, reader)
            })
    }
}

impl<T: RdValue> Synchronizable for RdSet<T> {
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        _synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError> {
        let other_set = downcast::<RdSet<T>>(other).ok_or_else(|| mismatch(self, other))?;
        let guard = SyncGuard::new();
        pipe(lifetime, self, &other_set, &guard);
        pipe(lifetime, &other_set, self, &guard);
        Ok(())
    }
}

// Sets merge: both sides end up with the union of their contents
fn pipe<T: RdValue>(
    lifetime: &Lifetime,
    from: &RdSet<T>,
    to: &RdSet<T>,
    guard: &SyncGuard,
) {
    let to = to.clone();
    let guard = guard.clone();
    let handler = move |event: &SetEvent<T>| {
        guard.run(|| {
            let outcome = match event {
                SetEvent::Add(value) => to.add(value.clone()),
                SetEvent::Remove(value) => to.remove(value),
            };
            if let Err(err) = outcome {
                error!("Failed to mirror set change onto `{}`: {}", to.location(), err);
            }
        });
    };
    from.advise(lifetime, handler);
}

impl<T: RdValue> fmt::Debug for RdSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdSet")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("items", &self.to_vec())
            .finish()
    }
}
