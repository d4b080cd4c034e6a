//! Storage-layer types for entity identity and creation.
//!
//! [`ExternalId`] is defined here (not in whatif-core) because it only exists
//! once an entity is persisted. Graphs and engines address entities by their
//! [`NodeId`] alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use whatif_core::{NodeId, PropertyBag};

/// Identifier a backend assigns to a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    /// Mints a fresh random id.
    pub fn generate() -> Self {
        ExternalId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity to create: its id, type label and initial properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub id: NodeId,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl EntitySpec {
    pub fn new(id: impl Into<NodeId>, entity_type: impl Into<String>) -> Self {
        EntitySpec {
            id: id.into(),
            entity_type: entity_type.into(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }
}

/// Summary of a stored entity (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: NodeId,
    pub external_id: ExternalId,
    pub entity_type: String,
    pub property_count: usize,
}
