//! `HashMapEventRegistry` — default `EventRegistry` implementation.
//!
//! A plain hash map keyed on the full 64-bit tag, mirroring the reference
//! binding's tarantool hash map: no specialized hashing structure is
//! warranted for this shape of data.

use std::collections::HashMap;
use transport_core::registry::{EventEntry, EventRegistry};
use transport_core::tag;

#[derive(Default)]
pub struct HashMapEventRegistry {
    entries: HashMap<u64, EventEntry>,
}

impl HashMapEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventRegistry for HashMapEventRegistry {
    fn register(&mut self, tag: u64, timeout_ns: u64, now_ns: u64) {
        if timeout_ns == 0 {
            return;
        }
        self.entries.insert(
            tag,
            EventEntry {
                timeout_ns,
                submission_timestamp_ns: now_ns,
            },
        );
    }

    fn remove(&mut self, tag: u64) {
        self.entries.remove(&tag);
    }

    fn check_timeouts(&mut self, now_ns: u64) -> Vec<u64> {
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ns))
            .map(|(tag, _)| *tag)
            .collect();
        for t in &expired {
            self.entries.remove(t);
        }
        expired
    }

    fn tags_for_fd(&self, fd: i32) -> Vec<u64> {
        self.entries
            .keys()
            .copied()
            .filter(|t| tag::decode(*t).map(|d| d.fd) == Some(fd))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_removed_on_check() {
        let mut reg = HashMapEventRegistry::new();
        reg.register(1, 100, 0);
        reg.register(2, 100, 0);
        assert!(reg.check_timeouts(50).is_empty());
        let expired = reg.check_timeouts(150);
        assert_eq!(expired.len(), 2);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn zero_timeout_is_never_tracked() {
        let mut reg = HashMapEventRegistry::new();
        reg.register(1, 0, 0);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn tags_for_fd_matches_payload_fd_bits() {
        use transport_core::tag::{encode, OpClass};
        let mut reg = HashMapEventRegistry::new();
        let t = encode(OpClass::Read, 7, Some(1), None);
        reg.register(t, 100, 0);
        assert_eq!(reg.tags_for_fd(7), vec![t]);
        assert!(reg.tags_for_fd(8).is_empty());
    }
}
