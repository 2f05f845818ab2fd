use std::{fmt, sync::Arc};

use log::{error, trace};
use ripple_serde::Serde;

use crate::{
    bindable_boilerplate,
    error::RdError,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    reactive::signal::Signal,
    serialization::value_serializer::{static_serializer, ValueSerializer},
    world::{
        component::reactive_base::ReactiveBase,
        entity::{bindable::Bindable, bindable::downcast, rd_value::RdValue},
        sync::{
            entity_view::{EntityView, Synchronizable},
            error::SyncError,
            model_synchronizer::{mismatch, ModelSynchronizer, SyncGuard},
        },
    },
};

struct SignalInner<T> {
    base: ReactiveBase,
    signal: Signal<T>,
    serializer: Arc<dyn ValueSerializer<T>>,
}

/// Replicated fire-and-forget event. A fire on one side is delivered to the other side's
/// listeners; nothing is remembered for listeners that subscribe later.
pub struct RdSignal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for RdSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RdValue + Serde> RdSignal<T> {
    pub fn new() -> Self {
        Self::with_serializer(static_serializer::<T>())
    }
}

impl<T: RdValue + Serde> Default for RdSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RdValue> RdSignal<T> {
    pub fn with_serializer(serializer: Arc<dyn ValueSerializer<T>>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                base: ReactiveBase::new(),
                signal: Signal::new(),
                serializer,
            }),
        }
    }

    /// Allows firing from threads other than the protocol's scheduler
    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    /// Sends `value` to the other side when bound, then delivers it to local listeners
    pub fn fire(&self, value: T) -> Result<(), RdError> {
        self.inner.base.check_threading()?;
        let serializer = self.inner.serializer.clone();
        let sent = self
            .inner
            .base
            .send_if_bound(|ctx, writer| serializer.write(ctx, writer, &value))?;
        if sent {
            trace!("signal `{}` ({}):: fire {:?}", self.location(), self.rd_id(), value);
        }
        self.inner.signal.fire(&value);
        Ok(())
    }

    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.signal.advise(lifetime, handler);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.signal.listener_count()
    }
}

impl<T: RdValue> Bindable for RdSignal<T> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Signal(self)
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        Box::new(RdSignal::with_serializer(self.inner.serializer.clone()))
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let inner = self.inner.clone();
        let location = self.location();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                let value = inner.serializer.read(ctx, reader)?;
                trace!("signal `{}` ({}):: received {:?}", location, inner.base.id(), value);
                inner.signal.fire(&value);
                Ok(())
            })
    }
}

impl<T: RdValue> Synchronizable for RdSignal<T> {
    fn synchronize_with(
        &self,
        lifetime: &Lifetime,
        other: &dyn Bindable,
        synchronizer: &ModelSynchronizer,
    ) -> Result<(), SyncError> {
        let other_signal = downcast::<RdSignal<T>>(other).ok_or_else(|| mismatch(self, other))?;
        let guard = SyncGuard::new();
        pipe(lifetime, self, &other_signal, &guard, *synchronizer);
        pipe(lifetime, &other_signal, self, &guard, *synchronizer);
        Ok(())
    }
}

fn pipe<T: RdValue>(
    lifetime: &Lifetime,
    from: &RdSignal<T>,
    to: &RdSignal<T>,
    guard: &SyncGuard,
    synchronizer: ModelSynchronizer,
) {
    let to = to.clone();
    let guard = guard.clone();
    let value_lifetime = lifetime.clone();
    from.advise(lifetime, move |value| {
        guard.run(|| {
            let mirrored = synchronizer.mirror_value(&value_lifetime, value);
            if let Err(err) = to.fire(mirrored) {
                error!("Failed to mirror fire onto `{}`: {}", to.location(), err);
            }
        });
    });
}

impl<T: RdValue> fmt::Debug for RdSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdSignal")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .finish()
    }
}
