use std::{any::Any, collections::HashMap, sync::Arc};

use log::trace;
use parking_lot::Mutex;

pub type InternedValue = Arc<dyn Any + Send + Sync>;

struct InternState {
    outgoing: HashMap<Vec<u8>, i32>,
    incoming: HashMap<i32, InternedValue>,
    next_id: i32,
}

/// One interning domain: a table from encoded values to small integers for the values this
/// side has sent, and the mirror table for values received from the counterpart.
pub struct InternRoot {
    domain: String,
    state: Mutex<InternState>,
}

impl InternRoot {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            state: Mutex::new(InternState {
                outgoing: HashMap::new(),
                incoming: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Looks up an encoded value, registering it under the next free id when unseen.
    /// Returns the id and whether it was freshly assigned.
    pub fn intern(&self, encoded: &[u8]) -> (i32, bool) {
        let mut state = self.state.lock();
        if let Some(id) = state.outgoing.get(encoded) {
            return (*id, false);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.outgoing.insert(encoded.to_vec(), id);
        trace!("Interned value #{} in domain `{}`", id, self.domain);
        (id, true)
    }

    /// Drops an outgoing entry so the next write of the value is sent in full under a new id
    pub fn forget(&self, encoded: &[u8]) -> bool {
        self.state.lock().outgoing.remove(encoded).is_some()
    }

    pub fn store_incoming(&self, id: i32, value: InternedValue) {
        self.state.lock().incoming.insert(id, value);
    }

    pub fn resolve(&self, id: i32) -> Option<InternedValue> {
        self.state.lock().incoming.get(&id).cloned()
    }

    pub fn outgoing_len(&self) -> usize {
        self.state.lock().outgoing.len()
    }

    pub fn incoming_len(&self) -> usize {
        self.state.lock().incoming.len()
    }
}
