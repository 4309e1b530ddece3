//! The one seam a host application fills in: what to do with completions.
//!
//! Everything else in this crate is wiring — rings, threads, ordered
//! shutdown. `WorkerHandler` is where domain logic (an echo server, a
//! request router, whatever) plugs in.

use transport_io::iouring_worker::IoUringWorker;

/// Invoked on each worker thread. `transport-runtime` never inspects port
/// payloads itself — it only drains the ring and calls back.
pub trait WorkerHandler: Send + Sync + 'static {
    /// Called once after the worker's ring is built, before the first
    /// `drain`. Good place to arm the worker's accept/connect ops if this
    /// worker also owns a listening socket directly.
    fn on_init(&self, worker: &mut IoUringWorker) {
        let _ = worker;
    }

    /// Called after every `drain()` call, even when it drained zero
    /// completions (so timers/housekeeping still run).
    fn on_tick(&self, worker: &mut IoUringWorker, drained: usize);
}
