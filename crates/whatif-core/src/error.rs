//! Core error types for whatif-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of building a graph model and addressing execution state.

use thiserror::Error;

use crate::id::{NodeId, RelationshipId};

/// Core errors produced by the whatif-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A computation node with this id is already registered.
    #[error("duplicate computation node id: '{id}'")]
    DuplicateNodeId { id: NodeId },

    /// A relationship with this id is already registered.
    #[error("duplicate relationship id: '{id}'")]
    DuplicateRelationshipId { id: RelationshipId },

    /// A relationship whose endpoints do not fit its kind.
    #[error("invalid relationship '{id}': {reason}")]
    InvalidRelationship { id: RelationshipId, reason: String },

    /// An entity id was not present in the execution state.
    #[error("entity not found: '{id}'")]
    EntityNotFound { id: NodeId },
}
