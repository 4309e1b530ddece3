//! Monotonic clock helper shared by the worker and its event registry.

use std::time::Instant;

/// Nanoseconds since an arbitrary epoch fixed at process start. Only
/// differences between two calls are meaningful.
pub fn now_ns() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}
