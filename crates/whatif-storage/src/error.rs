//! Storage error types for whatif-storage.

use thiserror::Error;

use whatif_core::NodeId;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization of a property bag failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    /// An entity with the given id was not found.
    #[error("entity not found: {0}")]
    EntityNotFound(NodeId),

    /// A bulk load asked for entities that do not exist.
    #[error("entities not found: {}", join(.0))]
    MissingEntities(Vec<NodeId>),

    /// An entity with the given id already exists.
    #[error("entity already exists: {0}")]
    DuplicateEntity(NodeId),
}

fn join(ids: &[NodeId]) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entities_lists_every_id() {
        let err = StorageError::MissingEntities(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "entities not found: a, b");
    }
}
