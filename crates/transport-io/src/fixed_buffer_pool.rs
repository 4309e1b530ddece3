//! `FixedBufferPool` — default `BufferPool` implementation.
//!
//! One contiguous heap allocation backs every buffer slot; the iovec table
//! built over it is registered with the kernel exactly once, at
//! construction. Allocation is a rotating-cursor scan over a `used` bitmap,
//! matching the allocator the reference C binding uses for its
//! `buffers_state` array: advance the cursor, wrap at the end, report
//! exhaustion after one full lap with nothing free.
//!
//! Deliberately not thread-safe: a worker's buffer pool is touched only by
//! the thread that owns the worker, so there are no atomics here.

use transport_core::buffer::{BufferId, BufferPool};

pub struct FixedBufferPool {
    storage: Box<[u8]>,
    buffer_size: usize,
    iovecs: Vec<libc::iovec>,
    used: Vec<bool>,
    cursor: usize,
    free_count: usize,
}

impl FixedBufferPool {
    pub fn new(buffers_count: usize, buffer_size: usize) -> Self {
        let mut storage = vec![0u8; buffers_count * buffer_size].into_boxed_slice();
        let base = storage.as_mut_ptr();
        let iovecs = (0..buffers_count)
            .map(|i| libc::iovec {
                iov_base: unsafe { base.add(i * buffer_size) } as *mut libc::c_void,
                iov_len: buffer_size,
            })
            .collect();
        Self {
            storage,
            buffer_size,
            iovecs,
            used: vec![false; buffers_count],
            cursor: 0,
            free_count: buffers_count,
        }
    }

    /// The iovec table to pass to `io_uring_register_buffers` once, at
    /// worker startup.
    pub fn registered_iovecs(&self) -> &[libc::iovec] {
        &self.iovecs
    }

    /// Raw bytes currently recorded as valid for `id`, honoring whatever
    /// `set_length` last recorded.
    pub fn as_slice(&self, id: BufferId) -> &[u8] {
        let iov = &self.iovecs[id as usize];
        unsafe { std::slice::from_raw_parts(iov.iov_base as *const u8, iov.iov_len) }
    }

    pub fn as_mut_slice(&mut self, id: BufferId) -> &mut [u8] {
        let start = id as usize * self.buffer_size;
        &mut self.storage[start..start + self.buffer_size]
    }
}

impl BufferPool for FixedBufferPool {
    fn get(&mut self) -> Option<BufferId> {
        if self.free_count == 0 {
            return None;
        }
        let capacity = self.used.len();
        for _ in 0..capacity {
            let idx = self.cursor;
            self.cursor = (self.cursor + 1) % capacity;
            if !self.used[idx] {
                self.used[idx] = true;
                self.free_count -= 1;
                self.iovecs[idx].iov_len = self.buffer_size;
                return Some(idx as BufferId);
            }
        }
        None
    }

    fn release(&mut self, id: BufferId) {
        let idx = id as usize;
        debug_assert!(self.used[idx], "double release of buffer {}", id);
        self.used[idx] = false;
        self.free_count += 1;
    }

    fn get_iovec(&self, id: BufferId) -> &libc::iovec {
        &self.iovecs[id as usize]
    }

    fn set_length(&mut self, id: BufferId, len: usize) {
        self.iovecs[id as usize].iov_len = len.min(self.buffer_size);
    }

    fn capacity(&self) -> usize {
        self.used.len()
    }

    fn free_count(&self) -> usize {
        self.free_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_and_recovery() {
        let mut pool = FixedBufferPool::new(4, 64);
        let ids: Vec<_> = (0..4).map(|_| pool.get().unwrap()).collect();
        assert!(pool.get().is_none());
        assert_eq!(pool.free_count(), 0);
        for id in ids {
            pool.release(id);
        }
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn ids_are_never_double_issued() {
        let mut pool = FixedBufferPool::new(8, 16);
        let mut issued = std::collections::HashSet::new();
        for _ in 0..8 {
            let id = pool.get().unwrap();
            assert!(issued.insert(id), "id {} issued twice", id);
        }
    }

    #[test]
    fn set_length_caps_at_buffer_size() {
        let mut pool = FixedBufferPool::new(1, 32);
        let id = pool.get().unwrap();
        pool.set_length(id, 1000);
        assert_eq!(pool.get_iovec(id).iov_len, 32);
    }

    #[test]
    fn released_buffer_resets_length_on_reacquire() {
        let mut pool = FixedBufferPool::new(1, 32);
        let id = pool.get().unwrap();
        pool.set_length(id, 4);
        pool.release(id);
        let id2 = pool.get().unwrap();
        assert_eq!(id, id2);
        assert_eq!(pool.get_iovec(id2).iov_len, 32);
    }
}
