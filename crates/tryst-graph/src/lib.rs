//! TRYST Naming Graph - the in-memory information graph
//!
//! This crate implements the data half of the rendezvous core:
//! - Scope and InformationItem nodes with multi-parent edges
//! - The shared node arena and dual identifier index
//! - The lazily populated host registry
//!
//! No pub/sub policy lives here; lookup, insert and remove only. The
//! lifecycle rules that mutate the graph belong to the engine crate.

pub mod host;
pub mod index;
pub mod item;
pub mod scope;

pub use host::*;
pub use index::*;
pub use item::*;
pub use scope::*;
