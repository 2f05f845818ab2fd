use parking_lot::Mutex;

use crate::lifetime::lifetime::{Lifetime, LifetimeDefinition};

/// Hands out nested lifetimes one at a time: asking for the next one terminates the previous.
pub struct SequentialLifetimes {
    parent: Lifetime,
    current: Mutex<Option<LifetimeDefinition>>,
}

impl SequentialLifetimes {
    pub fn new(parent: &Lifetime) -> Self {
        Self {
            parent: parent.clone(),
            current: Mutex::new(None),
        }
    }

    pub fn next(&self) -> Lifetime {
        let next = self.parent.create_nested();
        let lifetime = next.lifetime().clone();
        let previous = self.current.lock().replace(next);
        if let Some(previous) = previous {
            previous.terminate();
        }
        lifetime
    }

    pub fn terminate_current(&self) {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            previous.terminate();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map_or(true, |current| !current.is_alive())
    }
}
