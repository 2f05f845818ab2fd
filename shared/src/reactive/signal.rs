use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;

use crate::lifetime::lifetime::Lifetime;

pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SignalInner<T> {
    listeners: Mutex<Vec<(u64, Handler<T>)>>,
    next_key: AtomicU64,
}

/// Fire-and-forget event source. Subscribers see only values fired after they advised.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                listeners: Mutex::new(Vec::new()),
                next_key: AtomicU64::new(0),
            }),
        }
    }

    pub fn fire(&self, value: &T) {
        let listeners: Vec<Handler<T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for listener in listeners {
            listener(value);
        }
    }

    /// Subscribes `handler` until `lifetime` terminates
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((key, Arc::new(handler)));

        let weak: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);
        lifetime.on_termination(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|(listener_key, _)| *listener_key != key);
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}
