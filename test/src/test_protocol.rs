use std::sync::Arc;

use ripple_shared::{
    Bindable, IdKind, Lifetime, LifetimeDefinition, Protocol, QueueScheduler, RdError,
    Serializers,
};

use crate::local_wire::LocalWire;

/// One end of a [`TestProtocols`] pair
pub struct TestSide {
    pub protocol: Arc<Protocol>,
    pub wire: Arc<LocalWire>,
    pub scheduler: Arc<QueueScheduler>,
}

impl TestSide {
    /// Binds `entity` under `static_id` in this side's protocol
    pub fn bind_static(&self, entity: &dyn Bindable, name: &str, static_id: i64) -> Result<(), RdError> {
        self.protocol.bind_static(entity, name, static_id)
    }
}

/// A client and a server protocol joined by a [`LocalWire`] pair, both on
/// [`QueueScheduler`]s owned by the test thread. Nothing crosses until [`TestProtocols::exchange`].
pub struct TestProtocols {
    pub client: TestSide,
    pub server: TestSide,
    lifetime: LifetimeDefinition,
}

impl Default for TestProtocols {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProtocols {
    pub fn new() -> Self {
        Self::with_serializers(Arc::new(Serializers::new()))
    }

    /// Both protocols share `serializers`, so polymorphic types registered there resolve on
    /// either side
    pub fn with_serializers(serializers: Arc<Serializers>) -> Self {
        let lifetime = LifetimeDefinition::new();
        let client_scheduler = Arc::new(QueueScheduler::new("client"));
        let server_scheduler = Arc::new(QueueScheduler::new("server"));
        let (client_wire, server_wire) =
            LocalWire::pair(client_scheduler.clone(), server_scheduler.clone());

        let client = build_side(
            "client",
            IdKind::Client,
            &serializers,
            lifetime.lifetime(),
            client_wire,
            client_scheduler,
        );
        let server = build_side(
            "server",
            IdKind::Server,
            &serializers,
            lifetime.lifetime(),
            server_wire,
            server_scheduler,
        );

        Self {
            client,
            server,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> &Lifetime {
        self.lifetime.lifetime()
    }

    /// Flushes both wires and pumps both schedulers until nothing moves. Returns how many
    /// payloads crossed in total.
    pub fn exchange(&self) -> usize {
        let mut crossed = 0;
        loop {
            let flushed = self.client.wire.flush() + self.server.wire.flush();
            let ran = self.client.scheduler.pump() + self.server.scheduler.pump();
            crossed += flushed;
            if flushed == 0 && ran == 0 {
                return crossed;
            }
        }
    }

    /// Ends both protocols and everything bound under them
    pub fn terminate(&self) {
        self.lifetime.terminate();
    }
}

impl Drop for TestProtocols {
    fn drop(&mut self) {
        self.lifetime.terminate();
    }
}

fn build_side(
    name: &str,
    kind: IdKind,
    serializers: &Arc<Serializers>,
    lifetime: &Lifetime,
    wire: Arc<LocalWire>,
    scheduler: Arc<QueueScheduler>,
) -> TestSide {
    let protocol = Protocol::builder()
        .name(name)
        .identity_kind(kind)
        .serializers(serializers.clone())
        .scheduler(scheduler.clone())
        .wire(wire.clone())
        .lifetime(lifetime)
        .build()
        .expect("test protocol has a scheduler and a wire");
    TestSide {
        protocol,
        wire,
        scheduler,
    }
}
