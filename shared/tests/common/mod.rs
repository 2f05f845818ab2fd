use std::sync::Arc;

use parking_lot::Mutex;

use ripple_shared::{
    IdKind, Lifetime, Property, Protocol, RdId, Scheduler, SynchronousScheduler, Wire, WireBase,
    WireError, WireHandler,
};

/// Wire that keeps every sent payload and never delivers anything
pub struct RecordingWire {
    base: WireBase,
    pub sent: Mutex<Vec<(RdId, Vec<u8>)>>,
}

impl RecordingWire {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            base: WireBase::new(scheduler),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Hands a payload to the broker as if it had arrived from the other side
    pub fn deliver(&self, id: RdId, payload: Vec<u8>) {
        self.base.broker().dispatch(id, payload).unwrap();
    }

    pub fn subscription_count(&self) -> usize {
        self.base.broker().subscription_count()
    }
}

impl Wire for RecordingWire {
    fn send_payload(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError> {
        self.sent.lock().push((id, payload));
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

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A protocol on a synchronous scheduler over a [`RecordingWire`]
pub fn recording_protocol(lifetime: &Lifetime) -> (Arc<Protocol>, Arc<RecordingWire>) {
    init_logging();
    let scheduler: Arc<dyn Scheduler> = Arc::new(SynchronousScheduler);
    let wire = RecordingWire::new(scheduler.clone());
    let protocol = Protocol::builder()
        .name("test")
        .identity_kind(IdKind::Client)
        .scheduler(scheduler)
        .wire(wire.clone())
        .lifetime(lifetime)
        .build()
        .unwrap();
    (protocol, wire)
}
