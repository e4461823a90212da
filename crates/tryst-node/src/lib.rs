//! TRYST Node - runtime front of the rendezvous core
//!
//! Wraps the single-threaded engine for concurrent callers:
//! - `RendezvousNode`: shared, lock-protected domain with counters
//! - `service`: an async task serving requests over channels

pub mod node;
pub mod service;

pub use node::{NodeConfig, NodeStats, RendezvousNode};
pub use service::{spawn, ServiceChannels, ServiceHandle};
