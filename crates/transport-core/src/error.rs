//! Transport error types.

use std::fmt;

#[derive(Debug)]
pub enum TransportError {
    /// Ring is full; caller must submit, yield, and retry.
    RingFull,
    /// io_uring setup failed.
    IoUringSetup(i32),
    /// io_uring submission failed.
    IoUringSubmit(i32),
    /// Buffer or sequence pool has no free entries.
    PoolExhausted,
    /// The given worker/channel id is not registered with the balancer.
    UnknownChannel,
    /// Operation is not supported by this backend.
    Unsupported(&'static str),
    /// The component has not been initialized (ring not built, etc).
    NotInitialized,
    /// Kernel CQE carried a negative result; wraps the raw errno.
    Os(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingFull => write!(f, "ring full"),
            Self::IoUringSetup(e) => write!(f, "io_uring setup: errno {}", e),
            Self::IoUringSubmit(e) => write!(f, "io_uring submit: errno {}", e),
            Self::PoolExhausted => write!(f, "pool exhausted"),
            Self::UnknownChannel => write!(f, "unknown channel"),
            Self::Unsupported(what) => write!(f, "unsupported: {}", what),
            Self::NotInitialized => write!(f, "transport component not initialized"),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;
