use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::error;
use ripple_serde::{ByteReader, ByteWriter};

use crate::{
    error::RdError,
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    scheduler::Scheduler,
    serialization::{error::SerializationError, serialization_ctx::SerializationCtx},
    world::entity::{bindable_core::BindableCore, error::BindError},
};

/// State shared by every entity that talks over the wire under its own id
pub struct ReactiveBase {
    pub(crate) core: BindableCore,
    is_async: AtomicBool,
}

impl Default for ReactiveBase {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveBase {
    pub fn new() -> Self {
        Self {
            core: BindableCore::new(),
            is_async: AtomicBool::new(false),
        }
    }

    pub fn is_async(&self) -> bool {
        self.is_async.load(Ordering::Acquire)
    }

    pub fn set_async(&self, is_async: bool) {
        self.is_async.store(is_async, Ordering::Release);
    }

    pub fn check_threading(&self) -> Result<(), BindError> {
        self.core.check_threading(self.is_async())
    }

    /// Sends a payload for this entity's id when it is bound. Returns whether anything was sent.
    pub fn send_if_bound<W>(&self, mut write: W) -> Result<bool, RdError>
    where
        W: FnMut(&SerializationCtx, &mut ByteWriter) -> Result<(), SerializationError>,
    {
        let protocol = match self.core.bound_protocol() {
            Ok(protocol) => protocol,
            Err(_) => return Ok(false),
        };
        self.send_with(&protocol, &mut write)?;
        Ok(true)
    }

    /// Sends a payload through `protocol`, which the caller already resolved
    pub fn send_with(
        &self,
        protocol: &Protocol,
        write: &mut dyn FnMut(&SerializationCtx, &mut ByteWriter) -> Result<(), SerializationError>,
    ) -> Result<(), RdError> {
        let ctx = protocol.serialization_ctx();
        protocol
            .wire()
            .send(self.core.id(), &mut |writer| write(ctx, writer))?;
        Ok(())
    }

    /// Routes inbound payloads for this entity's id to `receive` on the protocol's scheduler.
    /// Receive failures are logged; they never reach the transport.
    pub fn advise_wire<R>(
        &self,
        lifetime: &Lifetime,
        protocol: &Arc<Protocol>,
        receive: R,
    ) -> Result<(), RdError>
    where
        R: Fn(&SerializationCtx, &mut ByteReader) -> Result<(), RdError> + Send + Sync + 'static,
    {
        self.advise_wire_on(lifetime, protocol, protocol.scheduler().clone(), receive)
    }

    /// Like [`ReactiveBase::advise_wire`], with an explicit scheduler
    pub fn advise_wire_on<R>(
        &self,
        lifetime: &Lifetime,
        protocol: &Arc<Protocol>,
        scheduler: Arc<dyn Scheduler>,
        receive: R,
    ) -> Result<(), RdError>
    where
        R: Fn(&SerializationCtx, &mut ByteReader) -> Result<(), RdError> + Send + Sync + 'static,
    {
        let id = self.core.id();
        let location = self.core.location();
        let ctx = protocol.serialization_ctx().clone();
        protocol.wire().advise_on(
            lifetime,
            id,
            scheduler,
            Arc::new(move |payload: &[u8]| {
                let mut reader = ByteReader::new(payload);
                if let Err(err) = receive(&ctx, &mut reader) {
                    error!("Failed to handle message for `{}` ({}): {}", location, id, err);
                }
            }),
        )?;
        Ok(())
    }

    pub fn id(&self) -> RdId {
        self.core.id()
    }
}
