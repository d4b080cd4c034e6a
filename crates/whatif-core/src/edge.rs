//! Relationship definitions.
//!
//! Relationships connect entities and computation nodes. A READS edge runs
//! from a value source (an entity, or another computation node) into a
//! computation node. A WRITES edge runs from a computation node into the
//! entity (or computation node) that receives its result. Both carry the name
//! of the property involved.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, RelationshipId};

/// Direction of data flow along a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// `source` value flows into the computation node `target`.
    Reads,
    /// Computation node `source` writes its result into `target`.
    Writes,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::Reads => write!(f, "READS"),
            RelationKind::Writes => write!(f, "WRITES"),
        }
    }
}

/// A typed, directed connection between two graph vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: RelationKind,
    /// Property read from `source` (READS) or written on `target` (WRITES).
    pub property: String,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Relationship {
    pub fn reads(
        id: impl Into<RelationshipId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        property: impl Into<String>,
    ) -> Self {
        Relationship {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: RelationKind::Reads,
            property: property.into(),
            name: String::new(),
        }
    }

    pub fn writes(
        id: impl Into<RelationshipId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        property: impl Into<String>,
    ) -> Self {
        Relationship {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: RelationKind::Writes,
            property: property.into(),
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_reads(&self) -> bool {
        self.kind == RelationKind::Reads
    }

    pub fn is_writes(&self) -> bool {
        self.kind == RelationKind::Writes
    }
}
