//! `Connector` — the one-shot-connect dual of [`crate::acceptor::Acceptor`].
//!
//! Connect requests arrive through a bounded queue sized to the ring
//! capacity (the same backpressure discipline the submit path uses
//! elsewhere in this codebase); each queued request becomes one `Connect`
//! SQE, and on success the resulting fd is forwarded to a balancer-selected
//! worker exactly like an accepted connection.

use crossbeam_queue::ArrayQueue;
use io_uring::{opcode, types, IoUring};
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};

use transport_core::balancer::Balancer;
use transport_core::config::ConnectorConfig;
use transport_core::error::{Result, TransportError};
use transport_core::socket::OwnedRawFd;
use transport_core::tag::{self, OpClass};

/// A queued connect request: an already-created socket fd and its
/// destination address.
pub struct ConnectRequest {
    pub fd: RawFd,
    pub addr: libc::sockaddr_storage,
    pub addr_len: libc::socklen_t,
}

pub struct Connector {
    ring: IoUring,
    pending: ArrayQueue<ConnectRequest>,
    inflight_addrs: HashMap<RawFd, (libc::sockaddr_storage, libc::socklen_t)>,
}

impl Connector {
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        let ring = IoUring::builder()
            .build(config.ring_size)
            .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;
        Ok(Self {
            ring,
            pending: ArrayQueue::new(config.ring_size as usize),
            inflight_addrs: HashMap::new(),
        })
    }

    pub fn ring_fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }

    /// Enqueue a connect request; returns it back if the queue is full
    /// (backpressure signal to the caller).
    pub fn request(&self, req: ConnectRequest) -> std::result::Result<(), ConnectRequest> {
        self.pending.push(req)
    }

    /// Submit every currently queued request as a `Connect` SQE.
    pub fn drain_requests(&mut self) -> Result<usize> {
        let mut n = 0;
        while let Some(req) = self.pending.pop() {
            self.inflight_addrs.insert(req.fd, (req.addr, req.addr_len));
            let (addr, addr_len) = self.inflight_addrs[&req.fd];
            let tag = tag::encode(OpClass::Connect, req.fd, None, None);
            let sqe = opcode::Connect::new(types::Fd(req.fd), &addr as *const _ as *const libc::sockaddr, addr_len)
                .build()
                .user_data(tag);
            self.push_retry(&sqe)?;
            n += 1;
        }
        if n > 0 {
            self.ring
                .submit()
                .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))?;
        }
        Ok(n)
    }

    /// Reap connect completions and forward successes to a balancer-selected
    /// worker, exactly like [`crate::acceptor::Acceptor::drain_and_forward`].
    pub fn drain_and_forward(&mut self, balancer: &mut dyn Balancer) -> usize {
        let results: Vec<(u64, i32)> = self
            .ring
            .completion()
            .map(|cqe| (cqe.user_data(), cqe.result()))
            .collect();
        let mut forwarded = 0;
        for (user_data, res) in results {
            let Some(decoded) = tag::decode(user_data) else { continue };
            // The connector's own `msg_ring` forwards complete on this same
            // ring; skip anything that isn't a fresh connect so a forward's
            // completion doesn't get mistaken for a connected fd.
            if decoded.class != OpClass::Connect {
                continue;
            }
            self.inflight_addrs.remove(&decoded.fd);
            if res < 0 {
                eprintln!("transport-io: connector errno {} on fd {}", -res, decoded.fd);
                continue;
            }
            // Owned from the moment `connect` succeeds: closed on drop
            // unless `into_raw` below hands it off to a worker ring.
            let connected = unsafe { OwnedRawFd::from_raw(decoded.fd) };
            let Some(channel) = balancer.next() else {
                eprintln!("transport-io: connector has no workers registered, dropping fd {}", decoded.fd);
                continue;
            };
            let tag = tag::encode(OpClass::Connect, 0, None, None);
            let sqe = opcode::MsgRingData::new(types::Fd(channel.ring_fd), decoded.fd, tag, None)
                .build()
                .user_data(tag::encode(OpClass::Message, 0, None, None));
            if self.push_retry(&sqe).is_ok() {
                connected.into_raw();
                forwarded += 1;
            }
        }
        let _ = self.ring.submit();
        forwarded
    }

    fn push_retry(&mut self, entry: &io_uring::squeue::Entry) -> Result<()> {
        loop {
            let pushed = unsafe { self.ring.submission().push(entry) };
            if pushed.is_ok() {
                return Ok(());
            }
            self.ring
                .submit()
                .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))?;
            std::thread::yield_now();
        }
    }
}
