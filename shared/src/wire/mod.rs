use std::sync::Arc;

use ripple_serde::ByteWriter;

use crate::{
    identity::rd_id::RdId, lifetime::lifetime::Lifetime, reactive::property::Property,
    scheduler::Scheduler, serialization::error::SerializationError,
};

pub mod error;
pub mod message_broker;
pub mod wire_base;

use error::WireError;

/// Receives the payload of one inbound frame
pub type WireHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Transport seen by entities: send a payload for an id, subscribe a handler for an id.
pub trait Wire: Send + Sync {
    /// Hands an already serialized payload to the transport. Must not block on I/O.
    fn send_payload(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError>;

    /// Routes inbound payloads for `id` to `handler`, executed on `scheduler`, until
    /// `lifetime` terminates
    fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError>;

    fn default_scheduler(&self) -> Arc<dyn Scheduler>;

    fn connected(&self) -> Property<bool>;

    fn is_subscribed(&self, id: RdId) -> bool;

    /// Serializes a payload with `writer` and sends it for `id`
    fn send(
        &self,
        id: RdId,
        writer: &mut dyn FnMut(&mut ByteWriter) -> Result<(), SerializationError>,
    ) -> Result<(), WireError> {
        if id.is_null() {
            return Err(WireError::NullId { operation: "send" });
        }
        let mut payload = ByteWriter::new();
        writer(&mut payload)?;
        self.send_payload(id, payload.to_bytes())
    }

    fn advise(&self, lifetime: &Lifetime, id: RdId, handler: WireHandler) -> Result<(), WireError> {
        self.advise_on(lifetime, id, self.default_scheduler(), handler)
    }
}
