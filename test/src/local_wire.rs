//! In-memory wire pair for end-to-end tests.
//! Routes payloads between two protocols without network I/O.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use log::warn;
use parking_lot::Mutex;

use ripple_shared::{
    Lifetime, Property, RdId, Scheduler, Wire, WireBase, WireError, WireHandler,
};

/// One end of a connected pair. Sent payloads wait in an outbox until [`LocalWire::flush`]
/// hands them to the counterpart's broker, so tests decide when messages cross.
pub struct LocalWire {
    base: WireBase,
    counterpart: Mutex<Weak<LocalWire>>,
    outbox: Mutex<VecDeque<(RdId, Vec<u8>)>>,
    sent: AtomicUsize,
    closed: AtomicBool,
}

impl LocalWire {
    /// Two wires connected to each other; each delivers inbound messages through its
    /// broker with the given default scheduler
    pub fn pair(
        left_scheduler: Arc<dyn Scheduler>,
        right_scheduler: Arc<dyn Scheduler>,
    ) -> (Arc<LocalWire>, Arc<LocalWire>) {
        let left = Arc::new(Self::new(left_scheduler));
        let right = Arc::new(Self::new(right_scheduler));
        *left.counterpart.lock() = Arc::downgrade(&right);
        *right.counterpart.lock() = Arc::downgrade(&left);
        left.base.set_connected(true);
        right.base.set_connected(true);
        (left, right)
    }

    fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            base: WireBase::new(scheduler),
            counterpart: Mutex::new(Weak::new()),
            outbox: Mutex::new(VecDeque::new()),
            sent: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Delivers everything sent so far to the counterpart. Returns how many payloads crossed.
    pub fn flush(&self) -> usize {
        let batch: Vec<(RdId, Vec<u8>)> = self.outbox.lock().drain(..).collect();
        let counterpart = match self.counterpart.lock().upgrade() {
            Some(counterpart) => counterpart,
            None => return 0,
        };
        let delivered = batch.len();
        for (id, payload) in batch {
            if let Err(err) = counterpart.base.broker().dispatch(id, payload) {
                warn!("Local delivery for {} failed: {}", id, err);
            }
        }
        delivered
    }

    /// Payloads sent but not flushed yet
    pub fn pending(&self) -> usize {
        self.outbox.lock().len()
    }

    /// Payloads accepted by `send_payload` since creation
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::Acquire)
    }

    pub fn subscription_count(&self) -> usize {
        self.base.broker().subscription_count()
    }

    /// Whether inbound messages for `id` still wait for a subscription
    pub fn has_pending(&self, id: RdId) -> bool {
        self.base.broker().has_pending(id)
    }

    /// Drops the connection on both ends. Unflushed payloads are lost.
    pub fn disconnect(&self) {
        self.close();
        if let Some(counterpart) = self.counterpart.lock().upgrade() {
            counterpart.close();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.outbox.lock().clear();
        self.base.set_connected(false);
    }
}

impl Wire for LocalWire {
    fn send_payload(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError> {
        if id.is_null() {
            return Err(WireError::NullId { operation: "send" });
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(WireError::Closed);
        }
        self.outbox.lock().push_back((id, payload));
        self.sent.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError> {
        self.base.advise_on(lifetime, id, scheduler, handler)
    }

    fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.base.default_scheduler()
    }

    fn connected(&self) -> Property<bool> {
        self.base.connected()
    }

    fn is_subscribed(&self, id: RdId) -> bool {
        self.base.broker().is_subscribed(id)
    }
}
