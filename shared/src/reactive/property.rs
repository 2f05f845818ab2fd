use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    lifetime::{lifetime::Lifetime, sequential_lifetimes::SequentialLifetimes},
    reactive::signal::Signal,
};

struct PropertyInner<T> {
    value: RwLock<Option<T>>,
    change: Signal<T>,
}

/// An observable slot that may start out empty.
///
/// [`Property::advise`] replays the current value (if any) before delivering changes. Setting a
/// value equal to the current one is not a change.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Property<T> {
    pub fn new(value: T) -> Self {
        Self::with_value(Some(value))
    }

    pub fn empty() -> Self {
        Self::with_value(None)
    }

    fn with_value(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                value: RwLock::new(value),
                change: Signal::new(),
            }),
        }
    }

    pub fn value(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Stores `value` and notifies listeners. Returns `false` when nothing changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.write();
            if current.as_ref() == Some(&value) {
                return false;
            }
            *current = Some(value.clone());
        }
        self.inner.change.fire(&value);
        true
    }

    /// Like `set`, but runs `before_notify` between storing the value and notifying listeners
    pub(crate) fn set_then<F: FnOnce(&T)>(&self, value: T, before_notify: F) -> bool {
        {
            let mut current = self.inner.value.write();
            if current.as_ref() == Some(&value) {
                return false;
            }
            *current = Some(value.clone());
        }
        before_notify(&value);
        self.inner.change.fire(&value);
        true
    }

    /// Fires on every change, never replays
    pub fn change(&self) -> &Signal<T> {
        &self.inner.change
    }

    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }
        let handler = Arc::new(handler);
        let replay = handler.clone();
        self.inner.change.advise(lifetime, move |value| handler(value));
        if let Some(current) = self.value() {
            replay(&current);
        }
    }

    /// Like `advise`, but each value also gets a lifetime that ends when the value is replaced
    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, &T) + Send + Sync + 'static,
    {
        let sequence = SequentialLifetimes::new(lifetime);
        self.advise(lifetime, move |value| {
            let value_lifetime = sequence.next();
            handler(&value_lifetime, value);
        });
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static + std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Property").field(&self.value()).finish()
    }
}
