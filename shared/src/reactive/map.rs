use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    lifetime::lifetime::{Lifetime, LifetimeDefinition},
    reactive::signal::Signal,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent<K, V> {
    Add { key: K, value: V },
    Update { key: K, old_value: V, new_value: V },
    Remove { key: K, value: V },
}

impl<K, V> MapEvent<K, V> {
    pub fn key(&self) -> &K {
        match self {
            MapEvent::Add { key, .. } | MapEvent::Update { key, .. } | MapEvent::Remove { key, .. } => key,
        }
    }
}

struct MapInner<K, V> {
    entries: Mutex<Vec<(K, V)>>,
    change: Signal<MapEvent<K, V>>,
}

/// Observable map that remembers insertion order
pub struct ViewableMap<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> Clone for ViewableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for ViewableMap<K, V>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ViewableMap<K, V>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MapInner {
                entries: Mutex::new(Vec::new()),
                change: Signal::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, value)| value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner.entries.lock().clone()
    }

    /// Inserts or replaces. Setting an equal value is not a change and fires nothing.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        let event = {
            let mut entries = self.inner.entries.lock();
            match entries.iter_mut().find(|(entry_key, _)| *entry_key == key) {
                Some((_, slot)) => {
                    if *slot == value {
                        return Some(value);
                    }
                    let old_value = std::mem::replace(slot, value.clone());
                    MapEvent::Update {
                        key,
                        old_value,
                        new_value: value,
                    }
                }
                None => {
                    entries.push((key.clone(), value.clone()));
                    MapEvent::Add { key, value }
                }
            }
        };
        self.inner.change.fire(&event);
        match event {
            MapEvent::Update { old_value, .. } => Some(old_value),
            _ => None,
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let (key, value) = {
            let mut entries = self.inner.entries.lock();
            let position = entries.iter().position(|(entry_key, _)| entry_key == key)?;
            entries.remove(position)
        };
        self.inner.change.fire(&MapEvent::Remove {
            key,
            value: value.clone(),
        });
        Some(value)
    }

    pub fn clear(&self) {
        for (key, _) in self.entries() {
            self.remove(&key);
        }
    }

    pub fn change(&self) -> &Signal<MapEvent<K, V>> {
        &self.inner.change
    }

    /// Replays the current entries as `Add` events, then follows changes
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&MapEvent<K, V>) + Send + Sync + 'static,
    {
        if !lifetime.is_alive() {
            return;
        }
        let handler = Arc::new(handler);
        let replay = handler.clone();
        self.inner.change.advise(lifetime, move |event| handler(event));
        for (key, value) in self.entries() {
            replay(&MapEvent::Add { key, value });
        }
    }

    /// Gives every entry a lifetime that ends when its value is replaced or removed
    pub fn view<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&Lifetime, &K, &V) + Send + Sync + 'static,
    {
        let slots: Arc<Mutex<Vec<(K, LifetimeDefinition)>>> = Arc::new(Mutex::new(Vec::new()));
        let parent = lifetime.clone();
        self.advise(lifetime, move |event| {
            let previous = {
                let mut slots = slots.lock();
                slots
                    .iter()
                    .position(|(key, _)| key == event.key())
                    .map(|position| slots.remove(position).1)
            };
            if let Some(previous) = previous {
                previous.terminate();
            }
            match event {
                MapEvent::Add { key, value }
                | MapEvent::Update {
                    key,
                    new_value: value,
                    ..
                } => {
                    let nested = parent.create_nested();
                    let entry_lifetime = nested.lifetime().clone();
                    slots.lock().push((key.clone(), nested));
                    handler(&entry_lifetime, key, value);
                }
                MapEvent::Remove { .. } => {}
            }
        });
    }
}
