use std::{fmt, sync::Arc, time::Instant};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use ripple_serde::{ByteReader, Serde};

use crate::{
    bindable_boilerplate,
    error::RdError,
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    protocol::Protocol,
    scheduler::synchronous_scheduler::SynchronousScheduler,
    serialization::{
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::reactive_base::ReactiveBase,
        entity::{bindable::Bindable, rd_value::RdValue},
        sync::entity_view::EntityView,
        task::{
            error::RpcError, rd_task::RdTask, rpc_timeouts::RpcTimeouts,
            task_result::RdTaskResult,
        },
    },
};

struct CallInner<Req, Res> {
    base: ReactiveBase,
    request_serializer: Arc<dyn ValueSerializer<Req>>,
    response_serializer: Arc<dyn ValueSerializer<Res>>,
    pending: Mutex<Vec<(RdId, RdTask<Res>)>>,
}

/// Caller side of a remote procedure, bound under the same id as its [`RdEndpoint`].
///
/// Requests go out as `task id · request`; responses come back as `task id · RdTaskResult`.
/// Responses are handled on the receiving thread so a caller blocked in [`RdCall::sync`] on the
/// protocol's own thread still sees them. Unbinding cancels every pending task.
///
/// [`RdEndpoint`]: super::rd_endpoint::RdEndpoint
pub struct RdCall<Req, Res> {
    inner: Arc<CallInner<Req, Res>>,
}

impl<Req, Res> Clone for RdCall<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Req: RdValue + Serde, Res: RdValue + Serde> RdCall<Req, Res> {
    pub fn new() -> Self {
        Self::with_serializers(static_serializer::<Req>(), static_serializer::<Res>())
    }
}

impl<Req: RdValue + Serde, Res: RdValue + Serde> Default for RdCall<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req: RdValue, Res: RdValue> RdCall<Req, Res> {
    pub fn with_serializers(
        request_serializer: Arc<dyn ValueSerializer<Req>>,
        response_serializer: Arc<dyn ValueSerializer<Res>>,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                base: ReactiveBase::new(),
                request_serializer,
                response_serializer,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Allows starting requests from threads other than the protocol's scheduler
    pub fn set_async(&self, is_async: bool) -> &Self {
        self.inner.base.set_async(is_async);
        self
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Sends `request` and returns a task that completes with the response
    pub fn start(&self, request: Req) -> Result<RdTask<Res>, RdError> {
        self.inner.base.check_threading()?;
        let protocol = self
            .inner
            .base
            .core
            .bound_protocol()
            .map_err(|_| RpcError::NotBound {
                location: self.location().to_string(),
            })?;

        let task_id = protocol.identities().next(self.rd_id());
        let task = RdTask::new();
        self.inner.pending.lock().push((task_id, task.clone()));

        let serializer = self.inner.request_serializer.clone();
        let sent = self.inner.base.send_with(&protocol, &mut |ctx, writer| {
            task_id.ser(writer);
            serializer.write(ctx, writer, &request)
        });
        if let Err(err) = sent {
            self.forget(task_id);
            return Err(err);
        }
        trace!(
            "call `{}` ({}) :: send request {} :: {:?}",
            self.location(),
            self.rd_id(),
            task_id,
            request
        );
        Ok(task)
    }

    /// Sends `request` and blocks for the response, logging a warning once the call gets slow
    pub fn sync(&self, request: Req, timeouts: RpcTimeouts) -> Result<Res, RdError> {
        let started = Instant::now();
        let task = self.start(request)?;

        let result = match task.wait(timeouts.warn_await) {
            Some(result) => result,
            None => {
                warn!(
                    "call `{}` ({}) :: no response after {} ms",
                    self.location(),
                    self.rd_id(),
                    started.elapsed().as_millis()
                );
                let remaining = timeouts.error_await.saturating_sub(started.elapsed());
                match task.wait(remaining) {
                    Some(result) => result,
                    None => {
                        task.cancel();
                        self.forget_completed();
                        return Err(RpcError::Timeout {
                            location: self.location().to_string(),
                            millis: started.elapsed().as_millis(),
                        }
                        .into());
                    }
                }
            }
        };

        match result {
            RdTaskResult::Success(value) => Ok(value),
            RdTaskResult::Cancelled => Err(RpcError::Cancelled {
                location: self.location().to_string(),
            }
            .into()),
            RdTaskResult::Fault(fault) => Err(RpcError::Fault(fault).into()),
        }
    }

    fn forget(&self, task_id: RdId) {
        self.inner.pending.lock().retain(|(id, _)| *id != task_id);
    }

    fn forget_completed(&self) {
        self.inner.pending.lock().retain(|(_, task)| !task.is_completed());
    }

    fn receive(
        inner: &CallInner<Req, Res>,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), RdError> {
        let task_id = RdId::de(reader)?;
        let result = RdTaskResult::read(inner.response_serializer.as_ref(), ctx, reader)?;

        let task = {
            let mut pending = inner.pending.lock();
            pending
                .iter()
                .position(|(id, _)| *id == task_id)
                .map(|position| pending.remove(position).1)
        };
        match task {
            Some(task) => {
                debug!(
                    "call `{}` ({}) :: task {} completed :: {}",
                    inner.base.core.location(),
                    inner.base.id(),
                    task_id,
                    result.kind_name()
                );
                task.set_if_empty(result);
            }
            None => trace!(
                "call `{}` ({}) :: no pending task {}, response dropped",
                inner.base.core.location(),
                inner.base.id(),
                task_id
            ),
        }
        Ok(())
    }
}

impl<Req: RdValue, Res: RdValue> Bindable for RdCall<Req, Res> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Call
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        Box::new(RdCall::with_serializers(
            self.inner.request_serializer.clone(),
            self.inner.response_serializer.clone(),
        ))
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        let receiver = self.inner.clone();
        self.inner.base.advise_wire_on(
            lifetime,
            protocol,
            Arc::new(SynchronousScheduler),
            move |ctx, reader| Self::receive(&receiver, ctx, reader),
        )?;

        let cancelled = self.inner.clone();
        lifetime.on_termination(move || {
            let pending = std::mem::take(&mut *cancelled.pending.lock());
            for (_, task) in pending {
                task.cancel();
            }
        });
        Ok(())
    }
}

impl<Req: RdValue, Res: RdValue> fmt::Debug for RdCall<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdCall")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("pending", &self.pending_count())
            .finish()
    }
}
