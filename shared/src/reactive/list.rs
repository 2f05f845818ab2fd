use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    lifetime::lifetime::{Lifetime, LifetimeDefinition},
    reactive::signal::Signal,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent<T> {
    Add { index: usize, value: T },
    Update { index: usize, old_value: T, new_value: T },
    Remove { index: usize, value: T },
}

impl<T> ListEvent<T> {
    pub fn index(&self) -> usize {
        match self {
            ListEvent::Add { index, .. }
            | ListEvent::Update { index, .. }
            | ListEvent::Remove { index, .. } => *index,
        }
    }
}

struct ListInner<T> {
    items: Mutex<Vec<T>>,
    change: Signal<ListEvent<T>>,
}

/// Observable ordered list
pub struct ViewableList<T> {
    inner: Arc<ListInner<T>>,
}

impl<T> Clone for ViewableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ViewableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ViewableList<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListInner {
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

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.lock().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.lock().clone()
    }

    pub fn add(&self, value: T) {
        let index = {
            let mut items = self.inner.items.lock();
            items.push(value.clone());
            items.len() - 1
        };
        self.inner.change.fire(&ListEvent::Add { index, value });
    }

    /// Inserts at `index`. Returns `false` when `index` is past the end.
    pub fn insert(&self, index: usize, value: T) -> bool {
        {
            let mut items = self.inner.items.lock();
            if index > items.len() {
                return false;
            }
            items.insert(index, value.clone());
        }
        self.inner.change.fire(&ListEvent::Add { index, value });
        true
    }

    /// Replaces the element at `index`, returning the old one
    pub fn set(&self, index: usize, value: T) -> Option<T> {
        let old_value = {
            let mut items = self.inner.items.lock();
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, value.clone())
        };
        self.inner.change.fire(&ListEvent::Update {
            index,
            old_value: old_value.clone(),
            new_value: value,
        });
        Some(old_value)
    }

    pub fn remove_at(&self, index: usize) -> Option<T> {
        let value = {
            let mut items = self.inner.items.lock();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.inner.change.fire(&ListEvent::Remove {
            index,
            value: value.clone(),
        });
        Some(value)
    }

    /// Removes elements from the back so indices reported to listeners stay valid
    pub fn clear(&self) {
        while let Some(last) = self.len().checked_sub(1) {
            self.remove_at(last);
        }
    }

    pub fn change(&self) -> &Signal<ListEvent<T>> {
        &self.inner.change
    }

    /// Replays the current contents as `Add` events, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&ListEvent<T>) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }
        let handler = Arc::new(handler);
        let replay = handler.clone();
        self.inner.change.advise(lifetime, move |event| handler(event));
        for (index, value) in self.to_vec().into_iter().enumerate() {
            replay(&ListEvent::Add { index, value });
        }
    }

    /// Gives every element a lifetime that ends when it is removed or replaced
    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, usize, &T) + Send + Sync + 'static,
    {
        let slots: Arc<Mutex<Vec<LifetimeDefinition>>> = Arc::new(Mutex::new(Vec::new()));
        let parent = lifetime.clone();
        self.advise(lifetime, move |event| match event {
            ListEvent::Add { index, value } => {
                let nested = parent.create_nested();
                let element_lifetime = nested.lifetime().clone();
                {
                    let mut slots = slots.lock();
                    let at = (*index).min(slots.len());
                    slots.insert(at, nested);
                }
                handler(&element_lifetime, *index, value);
            }
            ListEvent::Update {
                index, new_value, ..
            } => {
                let nested = parent.create_nested();
                let element_lifetime = nested.lifetime().clone();
                let previous = {
                    let mut slots = slots.lock();
                    slots
                        .get_mut(*index)
                        .map(|slot| std::mem::replace(slot, nested))
                };
                if let Some(previous) = previous {
                    previous.terminate();
                }
                handler(&element_lifetime, *index, new_value);
            }
            ListEvent::Remove { index, .. } => {
                let removed = {
                    let mut slots = slots.lock();
                    if *index < slots.len() {
                        Some(slots.remove(*index))
                    } else {
                        None
                    }
                };
                if let Some(removed) = removed {
                    removed.terminate();
                }
            }
        });
    }
}
