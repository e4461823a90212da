//! TRYST Core - Fundamental naming and request types
//!
//! This crate defines the types shared across the rendezvous workspace:
//! - Identifiers (FragmentId, FullId, NodeLabel, arena refs)
//! - Dissemination strategies and forwarding identifiers
//! - Pub/sub request and status codes
//! - Outbound notification and delegation events
//! - Error types

pub mod error;
pub mod event;
pub mod id;
pub mod request;
pub mod strategy;

pub use error::*;
pub use event::*;
pub use id::*;
pub use request::*;
pub use strategy::*;
