//! Buffer pool abstraction.
//!
//! A `BufferPool` manages the fixed set of iovecs a worker registers with
//! the kernel once at startup.
//!
//! # Implementors
//!
//! - `FixedBufferPool` (default, in `transport-io`): a worker-local
//!   rotating-cursor free list over a pre-registered iovec array. No
//!   atomics — the pool is only ever touched by the worker thread that owns
//!   it.

/// A handle identifying one registered buffer slot.
pub type BufferId = u16;

/// Sentinel returned by `is_registered` implementors that never register
/// with the kernel (none currently; kept for symmetry with `BufferHandle`
/// layouts elsewhere in this codebase).
pub const UNREGISTERED: u16 = u16::MAX;

/// Manages the lifecycle of fixed I/O buffers.
///
/// **Contract:**
/// - `get()` never blocks; it returns `None` when the pool is exhausted.
/// - `release()` of an id not currently allocated is a programming error.
/// - Iovec base pointers are stable for the pool's lifetime; they are
///   registered with the kernel exactly once, at construction.
pub trait BufferPool {
    /// Acquire a free buffer id, or `None` if the pool is exhausted.
    fn get(&mut self) -> Option<BufferId>;

    /// Return a buffer id to the free list.
    fn release(&mut self, id: BufferId);

    /// Borrow the iovec backing `id` for SQE construction.
    fn get_iovec(&self, id: BufferId) -> &libc::iovec;

    /// Record how many bytes of `id`'s buffer are logically valid (e.g.
    /// after a short read).
    fn set_length(&mut self, id: BufferId, len: usize);

    /// Total number of buffer slots in the pool.
    fn capacity(&self) -> usize;

    /// Number of slots currently free.
    fn free_count(&self) -> usize;
}
