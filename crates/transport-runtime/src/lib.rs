//! # transport-runtime — wires the default stack into a running transport
//!
//! `TransportRootBuilder` is the single composition point: it owns
//! construction of every ring (listener, acceptor, connector, N workers),
//! spawns one thread per ring, and tears them down in order on `Drop`.
//! Domain logic plugs in through [`handler::WorkerHandler`] — this crate
//! never looks inside a completion payload itself.

pub mod handler;
pub mod root;

pub use handler::WorkerHandler;
pub use root::{TransportRoot, TransportRootBuilder, TransportRootConfig};
