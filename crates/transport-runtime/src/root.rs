//! `TransportRoot` — the compositor that wires every ring-owning component
//! into one running transport.
//!
//! This is the dependency-injection point: the default stack
//! (`IoUringWorker`, `Acceptor`, `Connector`, `RoundRobinBalancer`,
//! `IoUringListener`) is wired here, one OS thread per ring, with an
//! ordered startup (listener, then workers, then acceptor) and an ordered
//! shutdown (stop accepting, drain workers, close listener) — the same
//! discipline the reference instance builder uses for its own tiers.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use transport_core::balancer::{Balancer, Channel};
use transport_core::config::{AcceptorConfig, ConnectorConfig, ListenerConfig, WorkerConfig};
use transport_core::error::{Result, TransportError};
use transport_core::listener::{Listener, ReapOutcome};
use transport_core::worker::Worker;

use transport_io::acceptor::Acceptor;
use transport_io::balancer::RoundRobinBalancer;
use transport_io::connector::{ConnectRequest, Connector};
use transport_io::iouring_worker::IoUringWorker;
use transport_io::listener::IoUringListener;

use crate::handler::WorkerHandler;

const WORKER_DRAIN_BATCH: usize = 64;
const ACCEPTOR_REAP_BATCH: usize = 64;
const IDLE_SLEEP: Duration = Duration::from_micros(200);

/// Configuration for the whole transport; each field maps onto one
/// ring-owning component's own config record.
pub struct TransportRootConfig {
    pub worker_count: usize,
    pub worker: WorkerConfig,
    pub acceptor: AcceptorConfig,
    pub connector: ConnectorConfig,
    pub listener: ListenerConfig,
}

impl Default for TransportRootConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            worker: WorkerConfig::default(),
            acceptor: AcceptorConfig::default(),
            connector: ConnectorConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

pub struct TransportRootBuilder {
    config: TransportRootConfig,
}

impl Default for TransportRootBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRootBuilder {
    pub fn new() -> Self {
        Self { config: TransportRootConfig::default() }
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n;
        self
    }

    pub fn worker_config(mut self, c: WorkerConfig) -> Self {
        self.config.worker = c;
        self
    }

    pub fn acceptor_config(mut self, c: AcceptorConfig) -> Self {
        self.config.acceptor = c;
        self
    }

    pub fn connector_config(mut self, c: ConnectorConfig) -> Self {
        self.config.connector = c;
        self
    }

    pub fn listener_config(mut self, c: ListenerConfig) -> Self {
        self.config.listener = c;
        self
    }

    /// Build and start the transport. `server_fd` must already be a bound
    /// (not yet listening) socket; the acceptor thread calls `listen()`.
    pub fn build<H: WorkerHandler>(mut self, server_fd: RawFd, handler: Arc<H>) -> Result<TransportRoot> {
        self.config.listener.workers_count = self.config.worker_count;

        let shutdown = Arc::new(AtomicBool::new(false));

        let listener = IoUringListener::new(&self.config.listener)?;
        let listener_fd = listener.ring_fd();

        let balancer = Arc::new(Mutex::new(RoundRobinBalancer::default()));

        let mut worker_handles = Vec::with_capacity(self.config.worker_count);
        for id in 0..self.config.worker_count {
            let worker_config = self.config.worker;
            let handler = Arc::clone(&handler);
            let shutdown = Arc::clone(&shutdown);
            let balancer = Arc::clone(&balancer);
            let handle = std::thread::Builder::new()
                .name(format!("transport-worker-{id}"))
                .spawn(move || {
                    worker_loop(id, worker_config, listener_fd, handler, shutdown, balancer);
                })
                .map_err(|_| TransportError::NotInitialized)?;
            worker_handles.push(handle);
        }

        // Workers register themselves into the balancer on their first tick;
        // give them a moment to show up before the acceptor starts handing
        // out connections. A handful of idle spins is enough since channel
        // registration happens before any ring I/O.
        for _ in 0..1000 {
            if balancer.lock().unwrap().len() >= self.config.worker_count {
                break;
            }
            std::thread::sleep(Duration::from_micros(50));
        }

        let connector = Arc::new(Mutex::new(Connector::new(&self.config.connector)?));

        let listener_handle = {
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("transport-listener".to_string())
                .spawn(move || listener_loop(listener, shutdown))
                .map_err(|_| TransportError::NotInitialized)?
        };

        let acceptor_handle = {
            let acceptor_config = self.config.acceptor.clone();
            let balancer = Arc::clone(&balancer);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("transport-acceptor".to_string())
                .spawn(move || acceptor_loop(acceptor_config, server_fd, balancer, shutdown))
                .map_err(|_| TransportError::NotInitialized)?
        };

        let connector_handle = {
            let connector = Arc::clone(&connector);
            let balancer = Arc::clone(&balancer);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("transport-connector".to_string())
                .spawn(move || connector_loop(connector, balancer, shutdown))
                .map_err(|_| TransportError::NotInitialized)?
        };

        Ok(TransportRoot {
            shutdown,
            connector,
            acceptor_handle: Some(acceptor_handle),
            connector_handle: Some(connector_handle),
            listener_handle: Some(listener_handle),
            worker_handles,
        })
    }
}

/// The running transport. Dropping it performs the ordered shutdown: stop
/// accepting, drain workers, close the listener.
pub struct TransportRoot {
    shutdown: Arc<AtomicBool>,
    connector: Arc<Mutex<Connector>>,
    acceptor_handle: Option<JoinHandle<()>>,
    connector_handle: Option<JoinHandle<()>>,
    listener_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl TransportRoot {
    pub fn builder() -> TransportRootBuilder {
        TransportRootBuilder::new()
    }

    /// Queue an outbound connect; the connector thread submits it on its
    /// next pass. Returns the request back if the connector's queue is full.
    pub fn connect(&self, req: ConnectRequest) -> std::result::Result<(), ConnectRequest> {
        self.connector.lock().unwrap().request(req)
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
    }
}

impl Drop for TransportRoot {
    fn drop(&mut self) {
        // 1. Stop accepting new work.
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(h) = self.acceptor_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.connector_handle.take() {
            let _ = h.join();
        }
        // 2. Drain and stop workers.
        for h in self.worker_handles.drain(..) {
            let _ = h.join();
        }
        // 3. Close the listener.
        if let Some(h) = self.listener_handle.take() {
            let _ = h.join();
        }
        eprintln!("transport-runtime: root shut down cleanly");
    }
}

fn worker_loop<H: WorkerHandler>(
    id: usize,
    config: WorkerConfig,
    listener_fd: RawFd,
    handler: Arc<H>,
    shutdown: Arc<AtomicBool>,
    balancer: Arc<Mutex<RoundRobinBalancer>>,
) {
    let mut worker = match IoUringWorker::new(id, config) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("transport-runtime: worker {id} failed to start: {e}");
            return;
        }
    };
    worker.attach_listener(listener_fd);
    balancer.lock().unwrap().add(Channel { worker_id: id, ring_fd: worker.ring_fd() });

    handler.on_init(&mut worker);

    while !shutdown.load(Ordering::Relaxed) {
        let n = worker.drain(WORKER_DRAIN_BATCH);
        handler.on_tick(&mut worker, n);
        let _ = worker.submit();
        if n == 0 {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

fn acceptor_loop(
    config: AcceptorConfig,
    server_fd: RawFd,
    balancer: Arc<Mutex<RoundRobinBalancer>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut acceptor = match Acceptor::new(&config, server_fd) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("transport-runtime: acceptor failed to start: {e}");
            return;
        }
    };
    if let Err(e) = acceptor.start() {
        eprintln!("transport-runtime: acceptor failed to arm accept: {e}");
        return;
    }
    while !shutdown.load(Ordering::Relaxed) {
        let n = {
            let mut b = balancer.lock().unwrap();
            acceptor.drain_and_forward(&mut *b)
        };
        if n == 0 {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
    acceptor.shutdown();
}

fn connector_loop(connector: Arc<Mutex<Connector>>, balancer: Arc<Mutex<RoundRobinBalancer>>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let (submitted, forwarded) = {
            let mut c = connector.lock().unwrap();
            let submitted = c.drain_requests().unwrap_or(0);
            let mut b = balancer.lock().unwrap();
            let forwarded = c.drain_and_forward(&mut *b);
            (submitted, forwarded)
        };
        if submitted == 0 && forwarded == 0 {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

fn listener_loop(mut listener: IoUringListener, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        listener.wait(1);
        match listener.reap(ACCEPTOR_REAP_BATCH) {
            ReapOutcome::Shutdown => break,
            ReapOutcome::Ready(0) => std::thread::sleep(IDLE_SLEEP),
            ReapOutcome::Ready(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_sizes_workers_to_parallelism() {
        let config = TransportRootConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.worker.ring_size, WorkerConfig::default().ring_size);
    }

    #[test]
    fn builder_overrides_worker_count() {
        let builder = TransportRootBuilder::new().worker_count(4);
        assert_eq!(builder.config.worker_count, 4);
    }
}
