use std::sync::atomic::{AtomicUsize, Ordering};

/// Marks the stretch during which container events originate locally and must be sent.
/// Events fired while applying a remote change happen outside any such stretch.
#[derive(Default)]
pub struct LocalChange {
    depth: AtomicUsize,
}

pub struct LocalChangeScope<'a> {
    depth: &'a AtomicUsize,
}

impl LocalChange {
    pub fn enter(&self) -> LocalChangeScope<'_> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        LocalChangeScope { depth: &self.depth }
    }

    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::Acquire) > 0
    }
}

impl Drop for LocalChangeScope<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
