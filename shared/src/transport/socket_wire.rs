use std::{
    io,
    net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

use crate::{
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    reactive::property::Property,
    scheduler::Scheduler,
    transport::{
        error::TransportError,
        frame::{frame_length, read_frame, write_frame},
        socket_config::SocketConfig,
    },
    wire::{error::WireError, wire_base::WireBase, Wire, WireHandler},
};

enum Outbound {
    Frame(RdId, Vec<u8>),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Client,
    Server,
}

struct SocketInner {
    role: Role,
    base: WireBase,
    config: SocketConfig,
    lifetime: Lifetime,
    closed: AtomicBool,
    outbound: Sender<Outbound>,
    queue: Receiver<Outbound>,
    stream: Mutex<Option<TcpStream>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// [`Wire`] over a TCP stream on the loopback interface.
///
/// Sends are queued and written by a background thread; a second background thread reads
/// frames and hands them to the broker. Either thread drops the connection on the first I/O
/// error or end of stream. A client keeps reconnecting until its lifetime ends; a server
/// accepts a single connection. Terminating the lifetime closes the socket and joins the
/// threads.
pub struct SocketWire {
    inner: Arc<SocketInner>,
    port: u16,
}

impl SocketWire {
    /// Connects to `127.0.0.1:port`, retrying every `config.connect_retry_interval`
    pub fn client(
        lifetime: &Lifetime,
        scheduler: Arc<dyn Scheduler>,
        port: u16,
        config: SocketConfig,
    ) -> Result<Arc<Self>, TransportError> {
        let inner = SocketInner::new(Role::Client, lifetime, scheduler, config);
        let wire = Arc::new(Self { inner, port });
        let worker = wire.inner.clone();
        wire.inner.spawn("client", move || worker.run_client(port))?;
        Ok(wire)
    }

    /// Listens on `127.0.0.1:port`; `None` or `Some(0)` picks an ephemeral port, see
    /// [`SocketWire::port`]
    pub fn server(
        lifetime: &Lifetime,
        scheduler: Arc<dyn Scheduler>,
        port: Option<u16>,
        config: SocketConfig,
    ) -> Result<Arc<Self>, TransportError> {
        let address = SocketAddr::from((Ipv4Addr::LOCALHOST, port.unwrap_or(0)));
        let bind_error = |err: io::Error| TransportError::Bind {
            address: address.to_string(),
            message: err.to_string(),
        };
        let listener = TcpListener::bind(address).map_err(bind_error)?;
        let local_port = listener.local_addr().map_err(bind_error)?.port();
        listener.set_nonblocking(true).map_err(bind_error)?;
        info!("Listening on 127.0.0.1:{}", local_port);

        let inner = SocketInner::new(Role::Server, lifetime, scheduler, config);
        let wire = Arc::new(Self {
            inner,
            port: local_port,
        });
        let worker = wire.inner.clone();
        wire.inner.spawn("server", move || worker.run_server(listener))?;
        Ok(wire)
    }

    /// Port the server listens on, or the port the client connects to
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl SocketInner {
    fn new(
        role: Role,
        lifetime: &Lifetime,
        scheduler: Arc<dyn Scheduler>,
        config: SocketConfig,
    ) -> Arc<Self> {
        let (outbound, queue) = unbounded();
        let inner = Arc::new(Self {
            role,
            base: WireBase::new(scheduler),
            config,
            lifetime: lifetime.clone(),
            closed: AtomicBool::new(!lifetime.is_alive()),
            outbound,
            queue,
            stream: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        });
        let closing = inner.clone();
        lifetime.on_termination(move || closing.close());
        inner
    }

    fn spawn<F>(&self, suffix: &str, body: F) -> Result<(), TransportError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name, suffix))
            .spawn(body)
            .map_err(|err| TransportError::io("spawn", &err))?;

        // readers of earlier client connections are done by now
        let mut threads = self.threads.lock();
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut *threads)
            .into_iter()
            .partition(|handle| handle.is_finished());
        for handle in finished {
            if handle.join().is_err() {
                error!("A socket thread panicked");
            }
        }
        *threads = running;
        threads.push(handle);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.lifetime.is_alive()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Closing {:?} socket wire", self.role);
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        let _ = self.outbound.send(Outbound::Close);
        self.base.set_connected(false);

        let current = thread::current().id();
        let threads = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("A socket thread panicked");
            }
        }
    }

    fn run_client(self: Arc<Self>, port: u16) {
        let address = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        while self.is_alive() {
            match TcpStream::connect(address) {
                Ok(stream) => {
                    debug!("Connected to {}", address);
                    self.run_connection(stream);
                }
                Err(err) => {
                    trace!("Connecting to {} failed: {}", address, err);
                    self.sleep(self.config.connect_retry_interval);
                }
            }
        }
    }

    fn run_server(self: Arc<Self>, listener: TcpListener) {
        while self.is_alive() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    if let Err(err) = stream.set_nonblocking(false) {
                        error!("{}", TransportError::io("configure", &err));
                        return;
                    }
                    self.run_connection(stream);
                    return;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.config.poll_interval);
                }
                Err(err) => {
                    error!("{}", TransportError::io("accept", &err));
                    return;
                }
            }
        }
    }

    // Sleeps in poll-sized steps so termination is noticed promptly
    fn sleep(&self, total: Duration) {
        let mut slept = Duration::ZERO;
        while slept < total && self.is_alive() {
            let step = self.config.poll_interval.min(total - slept);
            thread::sleep(step);
            slept += step;
        }
    }

    /// Writes queued frames on this thread while a reader thread feeds the broker. Returns once
    /// the connection is gone.
    fn run_connection(self: &Arc<Self>, stream: TcpStream) {
        if let Err(err) = stream.set_nodelay(self.config.no_delay) {
            warn!("{}", TransportError::io("set_nodelay", &err));
        }
        let (reader, registered) = match (stream.try_clone(), stream.try_clone()) {
            (Ok(reader), Ok(registered)) => (reader, registered),
            (Err(err), _) | (_, Err(err)) => {
                error!("{}", TransportError::io("clone", &err));
                return;
            }
        };
        *self.stream.lock() = Some(registered);
        if !self.is_alive() {
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        let connection_alive = Arc::new(AtomicBool::new(true));
        let receiving = self.clone();
        let receiving_alive = connection_alive.clone();
        if let Err(err) = self.spawn("reader", move || {
            receiving.read_loop(reader);
            receiving_alive.store(false, Ordering::Release);
        }) {
            error!("{}", err);
            return;
        }

        self.base.set_connected(true);
        self.write_loop(stream, &connection_alive);

        connection_alive.store(false, Ordering::Release);
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.base.set_connected(false);
        debug!("{:?} socket connection closed", self.role);
    }

    fn write_loop(&self, mut stream: TcpStream, connection_alive: &AtomicBool) {
        loop {
            match self.queue.recv_timeout(self.config.poll_interval) {
                Ok(Outbound::Frame(id, payload)) => {
                    trace!("Writing frame for {} ({} bytes)", id, payload.len());
                    if let Err(err) =
                        write_frame(&mut stream, id, &payload, self.config.max_frame_length)
                    {
                        error!("Dropping connection: {}", err);
                        return;
                    }
                }
                Ok(Outbound::Close) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if !connection_alive.load(Ordering::Acquire) || !self.is_alive() {
                        return;
                    }
                }
            }
        }
    }

    fn read_loop(&self, mut stream: TcpStream) {
        loop {
            match read_frame(&mut stream, self.config.max_frame_length) {
                Ok(Some((id, payload))) => {
                    trace!("Read frame for {} ({} bytes)", id, payload.len());
                    if let Err(err) = self.base.broker().dispatch(id, payload) {
                        warn!("Dropped inbound frame: {}", err);
                    }
                }
                Ok(None) => {
                    debug!("Peer closed the stream");
                    break;
                }
                Err(err) => {
                    if self.is_alive() {
                        error!("Dropping connection: {}", err);
                    }
                    break;
                }
            }
        }
        let _ = stream.shutdown(Shutdown::Both);
    }
}

impl Wire for SocketWire {
    fn send_payload(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError> {
        if id.is_null() {
            return Err(WireError::NullId { operation: "send" });
        }
        if !self.inner.is_alive() {
            return Err(WireError::Closed);
        }
        let length = frame_length(&payload);
        let max = self.inner.config.max_frame_length;
        if length > max {
            error!("Refusing to send frame for {}: {} bytes exceeds {}", id, length, max);
            return Err(WireError::FrameTooLarge { length, max });
        }
        self.inner
            .outbound
            .send(Outbound::Frame(id, payload))
            .map_err(|_| WireError::Closed)
    }

    fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError> {
        self.inner.base.advise_on(lifetime, id, scheduler, handler)
    }

    fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.inner.base.default_scheduler()
    }

    fn connected(&self) -> Property<bool> {
        self.inner.base.connected()
    }

    fn is_subscribed(&self, id: RdId) -> bool {
        self.inner.base.broker().is_subscribed(id)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Instant};

    use super::*;
    use crate::{
        lifetime::lifetime::LifetimeDefinition,
        scheduler::synchronous_scheduler::SynchronousScheduler,
    };

    #[test]
    fn reconnecting_client_does_not_accumulate_threads() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let kept = Arc::new(Mutex::new(None));
        let (accepting, keeping) = (accepted.clone(), kept.clone());
        // drops the first five connections right away and keeps the sixth
        thread::spawn(move || {
            for count in 1..=6 {
                if let Ok((stream, _)) = listener.accept() {
                    if count < 6 {
                        let _ = stream.shutdown(Shutdown::Both);
                    } else {
                        *keeping.lock() = Some(stream);
                    }
                    accepting.store(count, Ordering::Release);
                }
            }
        });

        let lifetime = LifetimeDefinition::new();
        let config = SocketConfig {
            connect_retry_interval: Duration::from_millis(5),
            poll_interval: Duration::from_millis(2),
            ..SocketConfig::default()
        };
        let wire = SocketWire::client(
            lifetime.lifetime(),
            Arc::new(SynchronousScheduler),
            port,
            config,
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while accepted.load(Ordering::Acquire) < 6 || wire.connected().value() != Some(true) {
            assert!(Instant::now() < deadline, "client did not reconnect");
            thread::sleep(Duration::from_millis(2));
        }

        // the client thread, the live reader and at most one reader still winding down
        assert!(wire.inner.threads.lock().len() <= 3);
        lifetime.terminate();
        drop(kept);
    }
}
