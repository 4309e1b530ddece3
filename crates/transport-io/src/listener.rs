//! `IoUringListener` — default `Listener` implementation.
//!
//! Owns a ring and a `ready_workers[worker_id] -> count` array. Workers
//! signal batch-readiness with `msg_ring(listener.ring_fd, worker_id, 0)`;
//! shutdown is a sentinel `msg_ring` with `res == -1`, matching
//! `transport_listener_close`/`transport_listener_reap` in the reference
//! binding.

use io_uring::{opcode, types, IoUring};
use std::os::unix::io::{AsRawFd, RawFd};

use transport_core::config::ListenerConfig;
use transport_core::error::{Result, TransportError};
use transport_core::listener::{Listener, ReapOutcome};

pub struct IoUringListener {
    ring: IoUring,
    ready_workers: Vec<u64>,
}

impl IoUringListener {
    pub fn new(config: &ListenerConfig) -> Result<Self> {
        let ring = IoUring::builder()
            .build(config.ring_size)
            .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;
        Ok(Self {
            ring,
            ready_workers: vec![0; config.workers_count],
        })
    }

    pub fn ring_fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }
}

impl Listener for IoUringListener {
    fn wait(&mut self, batch_size: usize) -> usize {
        let wanted = batch_size.max(1) as u32;
        match self.ring.submit_and_wait(wanted as usize) {
            Ok(_) => self.ring.completion().len(),
            Err(_) => 0,
        }
    }

    fn reap(&mut self, max: usize) -> ReapOutcome {
        let results: Vec<i32> = self.ring.completion().take(max).map(|cqe| cqe.result()).collect();
        let mut n = 0;
        for res in results {
            if res == -1 {
                return ReapOutcome::Shutdown;
            }
            if res >= 0 {
                let worker_id = res as usize;
                if let Some(count) = self.ready_workers.get_mut(worker_id) {
                    *count += 1;
                    n += 1;
                }
            }
        }
        ReapOutcome::Ready(n)
    }

    fn ready_count(&self, worker_id: usize) -> u64 {
        self.ready_workers.get(worker_id).copied().unwrap_or(0)
    }

    fn signal_shutdown(&mut self) -> Result<()> {
        let sqe = opcode::MsgRingData::new(types::Fd(self.ring_fd()), -1, 0, None).build();
        let pushed = unsafe { self.ring.submission().push(&sqe) };
        pushed.map_err(|_| TransportError::RingFull)?;
        self.ring
            .submit()
            .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_count_starts_at_zero() {
        let cfg = ListenerConfig { ring_size: 8, workers_count: 4 };
        let listener = IoUringListener::new(&cfg);
        // Ring creation requires a real kernel; skip gracefully if sandboxed
        // without io_uring support.
        if let Ok(listener) = listener {
            for w in 0..4 {
                assert_eq!(listener.ready_count(w), 0);
            }
        }
    }
}
