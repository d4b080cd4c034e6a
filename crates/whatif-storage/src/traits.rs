//! The [`PropertyStore`] trait defining the storage contract for entity
//! property bags.
//!
//! The engine never talks to a store. Callers load an
//! [`ExecutionState`](whatif_core::ExecutionState) before building an engine
//! and, when they choose to, write results back afterwards (see
//! [`crate::persist_outputs`]).

use std::collections::BTreeMap;

use whatif_core::{ExecutionState, NodeId, PropertyBag, StateDump};

use crate::error::StorageError;
use crate::types::{EntitySpec, EntitySummary, ExternalId};

/// The storage contract for entity property bags.
///
/// Entities are keyed by their [`NodeId`], the id models and graphs use. It
/// is the stable key for every read and write. The [`ExternalId`] a backend
/// mints in [`create_entities`](PropertyStore::create_entities) is an alias
/// for outside systems and never changes once assigned.
///
/// The trait is synchronous; engines run to completion without suspending.
pub trait PropertyStore {
    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Loads the bags of every entity in `ids` that exists, skipping the rest.
    fn load_properties_partial(&self, ids: &[NodeId]) -> Result<StateDump, StorageError>;

    /// Loads the bags of every entity in `ids`.
    ///
    /// Fails with [`StorageError::MissingEntities`] naming every id that does
    /// not exist.
    fn load_properties(&self, ids: &[NodeId]) -> Result<StateDump, StorageError> {
        let dump = self.load_properties_partial(ids)?;
        let mut missing: Vec<NodeId> = ids
            .iter()
            .filter(|id| !dump.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(dump);
        }
        missing.sort();
        missing.dedup();
        Err(StorageError::MissingEntities(missing))
    }

    /// Loads `ids` into a fresh execution state.
    fn load_state(&self, ids: &[NodeId]) -> Result<ExecutionState, StorageError> {
        Ok(ExecutionState::from(self.load_properties(ids)?))
    }

    /// Lists all stored entities, ordered by id.
    fn list_entities(&self) -> Result<Vec<EntitySummary>, StorageError>;

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Merges `properties` into the stored bag of `entity_id`.
    ///
    /// Fails with [`StorageError::EntityNotFound`] when no entity has that
    /// id. Properties not named in `properties` keep their stored values.
    fn write_properties(
        &mut self,
        entity_id: &str,
        properties: &PropertyBag,
    ) -> Result<(), StorageError>;

    /// Creates every entity in `specs`, atomically.
    ///
    /// Fails with [`StorageError::DuplicateEntity`] if any id already exists
    /// or appears twice in `specs`; nothing is created in that case.
    fn create_entities(
        &mut self,
        specs: &[EntitySpec],
    ) -> Result<BTreeMap<NodeId, ExternalId>, StorageError>;
}
