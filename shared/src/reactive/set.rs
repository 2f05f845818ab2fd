use std::sync::Arc;

use parking_lot::Mutex;

use crate::{lifetime::lifetime::Lifetime, reactive::signal::Signal};

#[derive(Debug, Clone, PartialEq)]
pub enum SetEvent<T> {
    Add(T),
    Remove(T),
}

struct SetInner<T> {
    items: Mutex<Vec<T>>,
    change: Signal<SetEvent<T>>,
}

/// Observable set that remembers insertion order
pub struct ViewableSet<T> {
    inner: Arc<SetInner<T>>,
}

impl<T> Clone for ViewableSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Default for ViewableSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ViewableSet<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SetInner {
                items: Mutex::new(Vec::new()),
                change: Signal::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.items.lock().contains(value)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.lock().clone()
    }

    /// Returns `false` when the value was already present
    pub fn add(&self, value: T) -> bool {
        {
            let mut items = self.inner.items.lock();
            if items.contains(&value) {
                return false;
            }
            items.push(value.clone());
        }
        self.inner.change.fire(&SetEvent::Add(value));
        true
    }

    pub fn remove(&self, value: &T) -> bool {
        let removed = {
            let mut items = self.inner.items.lock();
            match items.iter().position(|item| item == value) {
                Some(position) => items.remove(position),
                None => return false,
            }
        };
        self.inner.change.fire(&SetEvent::Remove(removed));
        true
    }

    pub fn clear(&self) {
        for value in self.to_vec() {
            self.remove(&value);
        }
    }

    pub fn change(&self) -> &Signal<SetEvent<T>> {
        &self.inner.change
    }

    /// Replays the current contents as `Add` events, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&SetEvent<T>) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }
        let handler = Arc::new(handler);
        let replay = handler.clone();
        self.inner.change.advise(lifetime, move |event| handler(event));
        for value in self.to_vec() {
            replay(&SetEvent::Add(value));
        }
    }
}
