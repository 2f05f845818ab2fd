use std::{collections::VecDeque, sync::Arc};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::{
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    reactive::property::Property,
    scheduler::Scheduler,
    wire::{error::WireError, Wire, WireHandler},
};

struct Outbox {
    connected: bool,
    queue: VecDeque<(RdId, Vec<u8>)>,
}

/// Wire of an extension's nested protocol.
///
/// Payloads travel over the parent wire, but only once the handshake has connected the two
/// sides; until then they are queued and later flushed in order. Subscriptions go straight to
/// the parent wire, on the extension's scheduler.
pub struct ExtWire {
    parent: Arc<dyn Wire>,
    scheduler: Arc<dyn Scheduler>,
    outbox: Mutex<Outbox>,
    connected: Property<bool>,
}

impl ExtWire {
    pub fn new(parent: Arc<dyn Wire>, scheduler: Arc<dyn Scheduler>, lifetime: &Lifetime) -> Arc<Self> {
        let wire = Arc::new(Self {
            parent,
            scheduler,
            outbox: Mutex::new(Outbox {
                connected: false,
                queue: VecDeque::new(),
            }),
            connected: Property::new(false),
        });
        let closing = Arc::downgrade(&wire);
        lifetime.on_termination(move || {
            if let Some(wire) = closing.upgrade() {
                let dropped = {
                    let mut outbox = wire.outbox.lock();
                    outbox.connected = false;
                    std::mem::take(&mut outbox.queue).len()
                };
                if dropped > 0 {
                    debug!("Extension wire closed with {} queued messages dropped", dropped);
                }
                wire.connected.set(false);
            }
        });
        wire
    }

    /// Flushes the queue in order, then lets sends through directly
    pub fn connect(&self) {
        loop {
            let batch = {
                let mut outbox = self.outbox.lock();
                if outbox.queue.is_empty() {
                    outbox.connected = true;
                    break;
                }
                std::mem::take(&mut outbox.queue)
            };
            // sends made while this batch is out are queued behind it
            for (id, payload) in batch {
                if let Err(err) = self.parent.send_payload(id, payload) {
                    debug!("Failed to flush queued message for {}: {}", id, err);
                }
            }
        }
        self.connected.set(true);
    }

    pub fn disconnect(&self) {
        self.outbox.lock().connected = false;
        self.connected.set(false);
    }

    pub fn queued(&self) -> usize {
        self.outbox.lock().queue.len()
    }
}

impl Wire for ExtWire {
    fn send_payload(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError> {
        {
            let mut outbox = self.outbox.lock();
            if !outbox.connected {
                trace!("Queued {} bytes for {} until the extension connects", payload.len(), id);
                outbox.queue.push_back((id, payload));
                return Ok(());
            }
        }
        self.parent.send_payload(id, payload)
    }

    fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError> {
        self.parent.advise_on(lifetime, id, scheduler, handler)
    }

    fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }

    fn connected(&self) -> Property<bool> {
        self.connected.clone()
    }

    fn is_subscribed(&self, id: RdId) -> bool {
        self.parent.is_subscribed(id)
    }
}
