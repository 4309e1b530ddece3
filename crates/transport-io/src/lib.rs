//! # transport-io — Default (io_uring) implementations
//!
//! This crate provides the default, worker-local implementation for every
//! `transport-core` trait, all built on a single `io-uring` instance per
//! ring-owning component. Each impl prioritizes correctness and a direct
//! mapping onto the kernel's completion model over cleverness; a faster
//! impl belongs behind a new type, not a rewrite of these.
//!
//! ## Default stack
//!
//! | Trait          | Default Impl            | Notes                          |
//! |----------------|--------------------------|--------------------------------|
//! | Worker         | IoUringWorker            | one ring per worker thread     |
//! | BufferPool     | FixedBufferPool          | rotating free-list cursor      |
//! | SequencePool   | LinkedSequencePool       | linked free-list of cells      |
//! | EventRegistry  | HashMapEventRegistry     | plain hash map, no sharding    |
//! | Balancer       | RoundRobinBalancer       | cycles registered channels     |
//! | Listener       | IoUringListener          | aggregates worker readiness    |
//! | —              | Acceptor                 | multishot accept + msg_ring    |
//! | —              | Connector                | one-shot connect + msg_ring    |

pub mod acceptor;
pub mod balancer;
pub mod connector;
pub mod event_registry;
pub mod fixed_buffer_pool;
pub mod iouring_worker;
pub mod linked_sequence_pool;
pub mod listener;
pub mod msg_scratch;
pub mod time;
