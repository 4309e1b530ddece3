//! Worker abstraction — the per-thread engine that stages SQEs on its own
//! ring and reaps CQEs.
//!
//! # Implementors
//!
//! - `IoUringWorker` (default, in `transport-io`): wraps a real
//!   `io_uring::IoUring`, builds opcodes per the tables in this module's
//!   doc comments, and dispatches completions by tag class.

use crate::error::Result;
use crate::socket::SocketFamily;
use std::os::unix::io::RawFd;

/// SQE chaining/ordering flags, a subset of the kernel's `IOSQE_*` bits
/// relevant at this abstraction layer.
pub mod sqe_flags {
    /// `IOSQE_IO_LINK` — this SQE depends on the previous one completing
    /// first (possibly with error propagation that aborts the chain).
    pub const IO_LINK: u8 = 1 << 0;
    /// `IOSQE_IO_HARDLINK` — like `IO_LINK` but the chain continues even if
    /// a prior link fails.
    pub const IO_HARDLINK: u8 = 1 << 1;
    /// `IOSQE_BUFFER_SELECT` — let the kernel choose the buffer from a
    /// registered provided-buffer ring.
    pub const BUFFER_SELECT: u8 = 1 << 2;
}

/// A zero timeout means "do not track this operation in the event
/// registry".
pub const NO_TIMEOUT: u64 = 0;

/// Per-operation parameters shared by the read/write/message preparers.
#[derive(Debug, Clone, Copy)]
pub struct TransferParams {
    pub fd: RawFd,
    pub buffer_id: u16,
    pub offset: u64,
    pub timeout_ns: u64,
    pub sqe_flags: u8,
    pub sequence_id: Option<u16>,
}

/// Additional parameters for message (sendmsg/recvmsg) operations.
#[derive(Debug, Clone, Copy)]
pub struct MessageParams {
    pub transfer: TransferParams,
    pub family: SocketFamily,
    pub msg_flags: i32,
}

/// The engine hosting one ring, its pools, its event registry, and its
/// per-family message-header scratch.
///
/// **Contract:** SQE acquisition must never fail visibly to the caller — if
/// the ring is full, the implementation submits what it has, yields to the
/// scheduler, and retries. This is the `provide_sqe` hard contract and the
/// only legal way to obtain an SQE.
pub trait Worker {
    /// Queue a read (or `read_fixed`) into `params.buffer_id`.
    fn add_read(&mut self, params: TransferParams) -> Result<u64>;

    /// Queue a write (or `write_fixed`) from `params.buffer_id`.
    fn add_write(&mut self, params: TransferParams) -> Result<u64>;

    /// Queue a `sendmsg` to the address pre-loaded into this fd's scratch
    /// `msghdr` for `params.transfer.family`.
    fn add_send_message(&mut self, params: MessageParams) -> Result<u64>;

    /// Queue a `recvmsg` into `params.transfer.buffer_id`, filling the
    /// source address into this fd's family-scoped scratch `msghdr`.
    fn add_receive_message(&mut self, params: MessageParams) -> Result<u64>;

    /// Queue a one-shot connect.
    fn connect(&mut self, fd: RawFd, timeout_ns: u64) -> Result<u64>;

    /// Queue a multishot accept.
    fn accept(&mut self, server_fd: RawFd) -> Result<u64>;

    /// Scan the event registry for tags whose fd matches and submit an
    /// async-cancel SQE for each. Best-effort; the original op's CQE still
    /// arrives.
    fn cancel_by_fd(&mut self, fd: RawFd) -> Result<()>;

    /// Remove a tag's entry from the event registry without cancelling the
    /// op (used once its CQE has been consumed).
    fn remove_event(&mut self, tag: u64);

    /// Flush all queued SQEs to the kernel.
    fn submit(&mut self) -> Result<usize>;

    /// Post a user-data-only completion to this worker's own ring (used for
    /// self-wakeup and out-of-band signaling).
    fn custom(&mut self, id: u64, data: u64) -> Result<()>;

    /// Drain one batch of completions and dispatch them. Returns the
    /// number of completions processed.
    fn drain(&mut self, max: usize) -> usize;
}
