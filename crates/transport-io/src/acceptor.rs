//! `Acceptor` — owns a ring dedicated to multishot accept plus forwarding
//! fds to worker rings via `msg_ring`.
//!
//! Mirrors `transport_acceptor_t` from the reference binding: the
//! acceptor's ring never performs reads or writes on accepted connections,
//! only accepts and ring-messages.

use io_uring::{opcode, types, IoUring};
use std::os::unix::io::{AsRawFd, RawFd};

use transport_core::balancer::Balancer;
use transport_core::config::AcceptorConfig;
use transport_core::error::{Result, TransportError};
use transport_core::socket::OwnedRawFd;
use transport_core::state::LifecycleState;
use transport_core::tag::{self, OpClass};

pub struct Acceptor {
    ring: IoUring,
    server_fd: RawFd,
    state: LifecycleState,
    backlog: i32,
}

impl Acceptor {
    /// `server_fd` must already be a bound socket (not yet listening —
    /// `start` calls `listen` itself); socket creation itself is out of
    /// scope.
    pub fn new(config: &AcceptorConfig, server_fd: RawFd) -> Result<Self> {
        let ring = IoUring::builder()
            .build(config.ring_size)
            .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;
        Ok(Self {
            ring,
            server_fd,
            state: LifecycleState::Idle,
            backlog: config.backlog,
        })
    }

    pub fn ring_fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Idle → Armed → Running: submit the multishot accept.
    pub fn start(&mut self) -> Result<()> {
        debug_assert!(self.state.can_transition_to(LifecycleState::Armed));
        self.state = LifecycleState::Armed;

        unsafe {
            libc::listen(self.server_fd, self.backlog);
        }

        let tag = tag::encode(OpClass::Accept, self.server_fd, None, None);
        let sqe = opcode::AcceptMulti::new(types::Fd(self.server_fd)).build().user_data(tag);
        self.push_retry(&sqe)?;
        self.ring
            .submit()
            .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))?;
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Reap accept completions and forward each accepted fd to a
    /// balancer-selected worker ring via `msg_ring`. Returns the number of
    /// fds forwarded.
    pub fn drain_and_forward(&mut self, balancer: &mut dyn Balancer) -> usize {
        let results: Vec<(u64, i32)> = self
            .ring
            .completion()
            .map(|cqe| (cqe.user_data(), cqe.result()))
            .collect();
        let mut forwarded = 0;
        for (user_data, res) in results {
            // The acceptor's own `msg_ring` forwards complete on this same
            // ring; skip anything that isn't a fresh accept so a forward's
            // completion doesn't get mistaken for an accepted fd.
            let Some(decoded) = tag::decode(user_data) else { continue };
            if decoded.class != OpClass::Accept {
                continue;
            }
            if res < 0 {
                eprintln!("transport-io: acceptor errno {} on fd {}", -res, self.server_fd);
                continue;
            }
            // Owned from the moment it leaves the kernel: closed on drop
            // unless `into_raw` below hands it off to a worker ring.
            let accepted = unsafe { OwnedRawFd::from_raw(res) };
            let Some(channel) = balancer.next() else {
                eprintln!("transport-io: acceptor has no workers registered, dropping fd {}", res);
                continue;
            };
            let tag = tag::encode(OpClass::Accept, 0, None, None);
            let sqe = opcode::MsgRingData::new(types::Fd(channel.ring_fd), res, tag, None)
                .build()
                .user_data(tag::encode(OpClass::Message, 0, None, None));
            if self.push_retry(&sqe).is_ok() {
                accepted.into_raw();
                forwarded += 1;
            }
        }
        let _ = self.ring.submit();
        forwarded
    }

    /// Running → Draining → Closed.
    pub fn shutdown(&mut self) {
        debug_assert!(self.state.can_transition_to(LifecycleState::Draining));
        self.state = LifecycleState::Draining;
        // Drain whatever is already queued so the ring can be released
        // without leaking in-flight accepts.
        while self.ring.completion().next().is_some() {}
        self.state = LifecycleState::Closed;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_are_forward_only() {
        let s = LifecycleState::Idle;
        assert!(s.can_transition_to(LifecycleState::Armed));
        assert!(!s.can_transition_to(LifecycleState::Running));
    }
}
