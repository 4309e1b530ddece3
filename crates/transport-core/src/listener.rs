//! Listener abstraction — aggregates per-worker readiness signals.
//!
//! # Implementors
//!
//! - `IoUringListener` (default, in `transport-io`): owns a ring and a
//!   `ready_workers[worker_id] -> count` array, incremented by `msg_ring`
//!   CQEs from workers and read by the host runtime.

/// Outcome of draining one batch of listener completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Normal operation; `n` worker-readiness signals were recorded.
    Ready(usize),
    /// The sentinel shutdown message (`msg_ring` with `res == -1`) was
    /// observed.
    Shutdown,
}

/// Aggregates worker readiness signals sent via ring-to-ring messages.
pub trait Listener {
    /// Block (subject to the host scheduler's yield points) until at least
    /// one completion is ready, up to `batch_size`. Returns the number of
    /// CQEs available to reap.
    fn wait(&mut self, batch_size: usize) -> usize;

    /// Reap up to `max` completions, updating `ready_workers` counts.
    fn reap(&mut self, max: usize) -> ReapOutcome;

    /// Current readiness count for `worker_id`.
    fn ready_count(&self, worker_id: usize) -> u64;

    /// Send the sentinel shutdown message to this listener's own ring.
    fn signal_shutdown(&mut self) -> crate::error::Result<()>;
}
