//! In-memory implementation of [`PropertyStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and demos. It keeps
//! the same semantics as the SQLite backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use whatif_core::{NodeId, PropertyBag, StateDump};

use crate::error::StorageError;
use crate::traits::PropertyStore;
use crate::types::{EntitySpec, EntitySummary, ExternalId};

#[derive(Debug, Clone)]
struct StoredEntity {
    external_id: ExternalId,
    entity_type: String,
    properties: PropertyBag,
}

/// HashMap-backed [`PropertyStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entities: HashMap<NodeId, StoredEntity>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl PropertyStore for InMemoryStore {
    fn load_properties_partial(&self, ids: &[NodeId]) -> Result<StateDump, StorageError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.entities
                    .get(id)
                    .map(|e| (id.clone(), e.properties.clone()))
            })
            .collect())
    }

    fn list_entities(&self) -> Result<Vec<EntitySummary>, StorageError> {
        let mut summaries: Vec<EntitySummary> = self
            .entities
            .iter()
            .map(|(id, e)| EntitySummary {
                id: id.clone(),
                external_id: e.external_id.clone(),
                entity_type: e.entity_type.clone(),
                property_count: e.properties.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    fn write_properties(
        &mut self,
        entity_id: &str,
        properties: &PropertyBag,
    ) -> Result<(), StorageError> {
        let stored = self
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| StorageError::EntityNotFound(entity_id.into()))?;
        stored.properties.merge(properties);
        Ok(())
    }

    fn create_entities(
        &mut self,
        specs: &[EntitySpec],
    ) -> Result<BTreeMap<NodeId, ExternalId>, StorageError> {
        let mut seen = BTreeSet::new();
        for spec in specs {
            if self.entities.contains_key(&spec.id) || !seen.insert(&spec.id) {
                return Err(StorageError::DuplicateEntity(spec.id.clone()));
            }
        }

        let mut created = BTreeMap::new();
        for spec in specs {
            let external_id = ExternalId::generate();
            self.entities.insert(
                spec.id.clone(),
                StoredEntity {
                    external_id: external_id.clone(),
                    entity_type: spec.entity_type.clone(),
                    properties: spec.properties.clone(),
                },
            );
            created.insert(spec.id.clone(), external_id);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::Value;

    fn seeded() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store
            .create_entities(&[
                EntitySpec::new("order_001", "Order")
                    .with_properties(PropertyBag::from_iter([("price", 100), ("quantity", 5)])),
                EntitySpec::new("invoice_001", "Invoice")
                    .with_properties(PropertyBag::from_iter([("tax_rate", 0.1)])),
            ])
            .unwrap();
        store
    }

    #[test]
    fn create_and_load() {
        let store = seeded();
        let dump = store
            .load_properties(&["order_001".into(), "invoice_001".into()])
            .unwrap();
        assert_eq!(dump.len(), 2);
        assert_eq!(
            dump[&NodeId::from("order_001")].get("price"),
            Some(&Value::Int(100))
        );
    }

    #[test]
    fn load_reports_every_missing_id() {
        let store = seeded();
        let err = store
            .load_properties(&["zeta".into(), "order_001".into(), "alpha".into()])
            .unwrap_err();
        match err {
            StorageError::MissingEntities(ids) => {
                assert_eq!(ids, vec![NodeId::from("alpha"), NodeId::from("zeta")]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let partial = store
            .load_properties_partial(&["zeta".into(), "order_001".into()])
            .unwrap();
        assert_eq!(partial.len(), 1);
    }

    #[test]
    fn write_merges_into_existing_bag() {
        let mut store = seeded();
        store
            .write_properties("order_001", &PropertyBag::from_iter([("price", 150)]))
            .unwrap();
        let bag = &store.load_properties(&["order_001".into()]).unwrap()[&NodeId::from("order_001")];
        assert_eq!(bag.get("price"), Some(&Value::Int(150)));
        assert_eq!(bag.get("quantity"), Some(&Value::Int(5)));
    }

    #[test]
    fn write_to_unknown_entity_fails() {
        let mut store = seeded();
        let err = store
            .write_properties("ghost", &PropertyBag::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::EntityNotFound(id) if id == "ghost"));
    }

    #[test]
    fn duplicate_creation_is_atomic() {
        let mut store = seeded();
        let err = store
            .create_entities(&[
                EntitySpec::new("fresh", "Order"),
                EntitySpec::new("order_001", "Order"),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEntity(_)));
        assert_eq!(store.len(), 2);

        let err = store
            .create_entities(&[EntitySpec::new("x", ""), EntitySpec::new("x", "")])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEntity(id) if id == "x"));
    }

    #[test]
    fn external_ids_are_distinct() {
        let mut store = InMemoryStore::new();
        let ids = store
            .create_entities(&[EntitySpec::new("a", ""), EntitySpec::new("b", "")])
            .unwrap();
        assert_ne!(ids[&NodeId::from("a")], ids[&NodeId::from("b")]);
        let listed = store.list_entities().unwrap();
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].external_id, ids[&NodeId::from("a")]);
    }
}
