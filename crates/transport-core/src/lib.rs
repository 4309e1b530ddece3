//! # transport-core — trait definitions for the transport
//!
//! This crate defines the trait boundaries for every axis of variability in
//! the transport: buffer pooling, sequence pooling, event tracking, worker
//! I/O, fd balancing, and readiness aggregation. Every component elsewhere
//! in this codebase depends on traits from this crate, never on concrete
//! types — swapping an implementation is a type-parameter change, not a
//! rewrite.
//!
//! ## Design principle
//!
//! Program to the interface. Start with the default, worker-local
//! implementations in `transport-io`; optimize with a new impl, not by
//! modifying the existing one.

pub mod balancer;
pub mod buffer;
pub mod config;
pub mod error;
pub mod listener;
pub mod port;
pub mod registry;
pub mod sequence;
pub mod socket;
pub mod state;
pub mod tag;
pub mod worker;
pub mod yield_;
