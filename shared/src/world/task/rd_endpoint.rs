use std::{
    error::Error,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use ripple_serde::{ByteReader, Serde};

use crate::{
    bindable_boilerplate,
    error::RdError,
    identity::rd_id::RdId,
    lifetime::lifetime::{Lifetime, LifetimeDefinition},
    protocol::Protocol,
    serialization::{
        serialization_ctx::SerializationCtx,
        value_serializer::{static_serializer, ValueSerializer},
    },
    world::{
        component::reactive_base::ReactiveBase,
        entity::{bindable::Bindable, rd_value::RdValue},
        sync::entity_view::EntityView,
        task::{
            rd_task::RdTask,
            task_result::{RdFault, RdTaskResult},
        },
    },
};

/// Handler given the lifetime of one request; the lifetime ends when the endpoint unbinds
pub type TaskHandler<Req, Res> = Arc<dyn Fn(&Lifetime, Req) -> RdTask<Res> + Send + Sync>;

struct EndpointInner<Req, Res> {
    base: ReactiveBase,
    request_serializer: Arc<dyn ValueSerializer<Req>>,
    response_serializer: Arc<dyn ValueSerializer<Res>>,
    handler: RwLock<Option<TaskHandler<Req, Res>>>,
    requests: Mutex<Vec<(RdId, LifetimeDefinition)>>,
}

/// Answering side of a remote procedure.
///
/// Each request runs under a lifetime nested in the endpoint's binding. A handler that fails
/// or panics answers with a fault; a request still unanswered when the endpoint unbinds is
/// answered `Cancelled`.
pub struct RdEndpoint<Req, Res> {
    inner: Arc<EndpointInner<Req, Res>>,
}

impl<Req, Res> Clone for RdEndpoint<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Req: RdValue + Serde, Res: RdValue + Serde> RdEndpoint<Req, Res> {
    pub fn new() -> Self {
        Self::with_serializers(static_serializer::<Req>(), static_serializer::<Res>())
    }
}

impl<Req: RdValue + Serde, Res: RdValue + Serde> Default for RdEndpoint<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req: RdValue, Res: RdValue> RdEndpoint<Req, Res> {
    pub fn with_serializers(
        request_serializer: Arc<dyn ValueSerializer<Req>>,
        response_serializer: Arc<dyn ValueSerializer<Res>>,
    ) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                base: ReactiveBase::new(),
                request_serializer,
                response_serializer,
                handler: RwLock::new(None),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answers every request synchronously; an `Err` is sent back as a fault
    pub fn set<F, E>(&self, handler: F)
    where
        F: Fn(Req) -> Result<Res, E> + Send + Sync + 'static,
        E: Error,
    {
        self.set_task_handler(move |_, request| match handler(request) {
            Ok(response) => RdTask::success(response),
            Err(err) => RdTask::from_result(RdTaskResult::Fault(RdFault::from_error(&err))),
        });
    }

    /// Answers with a task that may complete later
    pub fn set_task_handler<F>(&self, handler: F)
    where
        F: Fn(&Lifetime, Req) -> RdTask<Res> + Send + Sync + 'static,
    {
        *self.inner.handler.write() = Some(Arc::new(handler));
    }

    /// Requests received and not answered yet
    pub fn pending_count(&self) -> usize {
        self.inner.requests.lock().len()
    }

    fn receive(
        inner: &Arc<EndpointInner<Req, Res>>,
        protocol: &Arc<Protocol>,
        bind_lifetime: &Lifetime,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), RdError> {
        let task_id = RdId::de(reader)?;
        let request = inner.request_serializer.read(ctx, reader)?;
        let location = inner.base.core.location();
        trace!(
            "endpoint `{}` ({}) :: received request {} :: {:?}",
            location,
            inner.base.id(),
            task_id,
            request
        );

        let responder = Responder {
            protocol: protocol.clone(),
            id: inner.base.id(),
            task_id,
            serializer: inner.response_serializer.clone(),
            answered: Arc::new(AtomicBool::new(false)),
        };
        let request_definition = bind_lifetime.create_nested();
        let request_lifetime = request_definition.lifetime().clone();
        let cancelling = responder.clone();
        request_lifetime.on_termination(move || cancelling.answer(&RdTaskResult::Cancelled));
        inner.requests.lock().push((task_id, request_definition));

        let handler = inner.handler.read().clone();
        let task = match handler {
            Some(handler) => {
                match catch_unwind(AssertUnwindSafe(|| handler(&request_lifetime, request))) {
                    Ok(task) => task,
                    Err(payload) => RdTask::from_result(RdTaskResult::Fault(RdFault::from_panic(payload))),
                }
            }
            None => RdTask::from_result(RdTaskResult::Fault(RdFault::new(
                "RdEndpoint",
                &format!("No handler set for `{}`", location),
            ))),
        };

        let finished = inner.clone();
        task.advise(&request_lifetime, move |result| {
            responder.answer(result);
            Self::finish(&finished, task_id);
        });
        Ok(())
    }

    fn finish(inner: &EndpointInner<Req, Res>, task_id: RdId) {
        let definition = {
            let mut requests = inner.requests.lock();
            requests
                .iter()
                .position(|(id, _)| *id == task_id)
                .map(|position| requests.remove(position).1)
        };
        if let Some(definition) = definition {
            definition.terminate();
        }
    }
}

struct Responder<Res> {
    protocol: Arc<Protocol>,
    id: RdId,
    task_id: RdId,
    serializer: Arc<dyn ValueSerializer<Res>>,
    answered: Arc<AtomicBool>,
}

impl<Res> Clone for Responder<Res> {
    fn clone(&self) -> Self {
        Self {
            protocol: self.protocol.clone(),
            id: self.id,
            task_id: self.task_id,
            serializer: self.serializer.clone(),
            answered: self.answered.clone(),
        }
    }
}

impl<Res: RdValue> Responder<Res> {
    /// Sends `result` unless this request was already answered
    fn answer(&self, result: &RdTaskResult<Res>) {
        if self.answered.swap(true, Ordering::AcqRel) {
            return;
        }
        let ctx = self.protocol.serialization_ctx();
        let sent = self.protocol.wire().send(self.id, &mut |writer| {
            self.task_id.ser(writer);
            result.write(self.serializer.as_ref(), ctx, writer)
        });
        match sent {
            Ok(()) => debug!(
                "endpoint ({}) :: task {} answered :: {}",
                self.id,
                self.task_id,
                result.kind_name()
            ),
            Err(err) => debug!(
                "endpoint ({}) :: could not answer task {}: {}",
                self.id, self.task_id, err
            ),
        }
    }
}

impl<Req: RdValue, Res: RdValue> Bindable for RdEndpoint<Req, Res> {
    bindable_boilerplate!(inner.base.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Endpoint
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        let copy = RdEndpoint::with_serializers(
            self.inner.request_serializer.clone(),
            self.inner.response_serializer.clone(),
        );
        *copy.inner.handler.write() = self.inner.handler.read().clone();
        Box::new(copy)
    }

    fn allows_off_thread_binding(&self) -> bool {
        self.inner.base.is_async()
    }

    fn init(&self, lifetime: &Lifetime, protocol: &Arc<Protocol>) -> Result<(), RdError> {
        // requests still listed here were cancelled through their nested lifetimes
        let cleared = self.inner.clone();
        lifetime.on_termination(move || cleared.requests.lock().clear());

        let receiver = self.inner.clone();
        let responding_protocol = protocol.clone();
        let bind_lifetime = lifetime.clone();
        self.inner
            .base
            .advise_wire(lifetime, protocol, move |ctx, reader| {
                Self::receive(&receiver, &responding_protocol, &bind_lifetime, ctx, reader)
            })
    }
}

impl<Req: RdValue, Res: RdValue> fmt::Debug for RdEndpoint<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdEndpoint")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("pending", &self.pending_count())
            .finish()
    }
}
