//! Error types for the rendezvous core
//!
//! Lifecycle rejections are *not* errors - they are ordinary
//! [`RvStatus`](crate::RvStatus) outcomes. `RvError` covers internal
//! defects only: a detected graph invariant violation aborts the affected
//! operation loudly instead of silently repairing the graph.

use thiserror::Error;

use crate::{FullId, ItemRef, ScopeRef};

/// Internal rendezvous faults.
#[derive(Error, Debug)]
pub enum RvError {
    #[error("malformed identifier: {0} raw bytes is not a whole number of fragments")]
    MalformedIdentifier(usize),

    #[error("identifier {id} resolves to both a scope and an information item")]
    KindCollision { id: FullId },

    #[error("dangling scope reference {0:?}")]
    DanglingScope(ScopeRef),

    #[error("dangling item reference {0:?}")]
    DanglingItem(ItemRef),

    #[error("rendezvous service stopped")]
    ServiceStopped,
}

/// Result type for rendezvous operations.
pub type RvResult<T> = Result<T, RvError>;
