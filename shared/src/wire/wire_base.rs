use std::sync::Arc;

use crate::{
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    reactive::property::Property,
    scheduler::Scheduler,
    wire::{error::WireError, message_broker::MessageBroker, WireHandler},
};

/// State every concrete wire shares: the inbound broker and the connection flag
pub struct WireBase {
    broker: MessageBroker,
    connected: Property<bool>,
}

impl WireBase {
    pub fn new(default_scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            broker: MessageBroker::new(default_scheduler),
            connected: Property::new(false),
        }
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    pub fn connected(&self) -> Property<bool> {
        self.connected.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError> {
        self.broker.advise_on(lifetime, id, scheduler, handler)
    }

    pub fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.broker.default_scheduler()
    }
}
