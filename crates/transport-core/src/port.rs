//! Runtime port payloads.
//!
//! The core surfaces events to the host runtime by posting a payload to one
//! of four typed ports per worker. Each payload is heap-allocated and handed
//! to the runtime as an owned pointer; the runtime must call
//! [`PortPayload::into_raw`]'s dual, [`PortPayload::from_raw`], exactly once
//! to reclaim it and release any buffer id it references.

use crate::buffer::BufferId;
use std::os::unix::io::RawFd;

/// Sentinel size reported on a hard error or cancellation, in place of a
/// real byte count.
pub const SENTINEL_SIZE: usize = usize::MAX;

/// Read/write completion payload.
#[derive(Debug)]
pub struct TransferPayload {
    pub data_ptr: *mut u8,
    pub size: usize,
    pub fd: RawFd,
    /// The buffer id backing `data_ptr`, so the release callback can return
    /// it to the pool.
    pub buffer_id: Option<BufferId>,
    /// The sequence this transfer's buffer was chained into, if any. Set
    /// when the op was prepared with a `sequence_id`; the worker has
    /// already released the corresponding sequence element by the time this
    /// payload reaches the runtime.
    pub sequence_id: Option<crate::sequence::SequenceId>,
}

/// Accept/connect completion payload.
#[derive(Debug)]
pub struct AddressPayload {
    pub fd: RawFd,
    pub sockaddr: libc::sockaddr_storage,
    pub sockaddr_len: libc::socklen_t,
}

/// A payload delivered through one of the four runtime ports.
///
/// # Safety
///
/// The core posts a payload to the runtime as a raw pointer produced by
/// `Box::into_raw` (see `into_raw`/`from_raw` below). The runtime owns the
/// pointee after delivery and must eventually call `from_raw` exactly once
/// to reclaim it; failing to do so leaks the payload and (for `Transfer`)
/// its buffer id.
#[derive(Debug)]
pub enum PortPayload {
    Transfer(TransferPayload),
    Address(AddressPayload),
}

impl PortPayload {
    /// Leaks `self` onto the heap and returns the pointer to hand to the
    /// runtime across the port boundary.
    pub fn into_raw(self) -> *mut PortPayload {
        Box::into_raw(Box::new(self))
    }

    /// Reclaims a payload previously produced by `into_raw`.
    ///
    /// # Safety
    /// `ptr` must have come from `PortPayload::into_raw` and must not have
    /// been reclaimed already.
    pub unsafe fn from_raw(ptr: *mut PortPayload) -> Box<PortPayload> {
        Box::from_raw(ptr)
    }

    /// The buffer id this payload holds, if it holds one.
    pub fn buffer_id(&self) -> Option<BufferId> {
        match self {
            PortPayload::Transfer(t) => t.buffer_id,
            PortPayload::Address(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_raw_from_raw_round_trips() {
        let payload = PortPayload::Transfer(TransferPayload {
            data_ptr: std::ptr::null_mut(),
            size: 3,
            fd: 7,
            buffer_id: Some(2),
            sequence_id: None,
        });
        let raw = payload.into_raw();
        let back = unsafe { PortPayload::from_raw(raw) };
        assert_eq!(back.buffer_id(), Some(2));
    }
}
