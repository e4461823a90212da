//! TRYST Engine - pub/sub lifecycle and rendezvous matching
//!
//! This crate implements the policy half of the rendezvous core:
//! - The lifecycle state machine over the naming graph
//! - Publisher/subscriber matching with local or delegated resolution
//! - Notification fan-out towards the local node and the Topology
//!   Authority
//!
//! The engine is synchronous and single-threaded; callers serialize
//! requests and drain the outbound queues between them.

pub mod dispatcher;
pub mod lifecycle;
pub mod rendezvous;

pub use dispatcher::NotificationDispatcher;
pub use lifecycle::RendezvousDomain;
