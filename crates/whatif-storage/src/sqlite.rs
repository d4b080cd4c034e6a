//! SQLite implementation of [`PropertyStore`].
//!
//! [`SqliteStore`] keeps one row per entity with its property bag stored as
//! a JSON TEXT column. Every write runs inside a transaction.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, Connection, OptionalExtension};

use whatif_core::{NodeId, PropertyBag, StateDump};

use crate::error::StorageError;
use crate::traits::PropertyStore;
use crate::types::{EntitySpec, EntitySummary, ExternalId};

/// SQLite-backed implementation of [`PropertyStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    fn load_bag(&self, id: &str) -> Result<Option<PropertyBag>, StorageError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT properties FROM entities WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(StorageError::from))
            .transpose()
    }
}

impl PropertyStore for SqliteStore {
    fn load_properties_partial(&self, ids: &[NodeId]) -> Result<StateDump, StorageError> {
        let mut dump = StateDump::new();
        for id in ids {
            if dump.contains_key(id) {
                continue;
            }
            if let Some(bag) = self.load_bag(id.as_str())? {
                dump.insert(id.clone(), bag);
            }
        }
        Ok(dump)
    }

    fn list_entities(&self) -> Result<Vec<EntitySummary>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, external_id, entity_type, properties FROM entities ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, external_id, entity_type, properties) = row?;
            let bag: PropertyBag = serde_json::from_str(&properties)?;
            summaries.push(EntitySummary {
                id: NodeId(id),
                external_id: ExternalId(external_id),
                entity_type,
                property_count: bag.len(),
            });
        }
        Ok(summaries)
    }

    fn write_properties(
        &mut self,
        entity_id: &str,
        properties: &PropertyBag,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let json: Option<String> = tx
            .query_row(
                "SELECT properties FROM entities WHERE id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Err(StorageError::EntityNotFound(entity_id.into()));
        };

        let mut bag: PropertyBag = serde_json::from_str(&json)?;
        bag.merge(properties);
        tx.execute(
            "UPDATE entities SET properties = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![serde_json::to_string(&bag)?, entity_id],
        )?;
        tx.commit()?;
        tracing::debug!(entity = entity_id, properties = properties.len(), "wrote properties");
        Ok(())
    }

    fn create_entities(
        &mut self,
        specs: &[EntitySpec],
    ) -> Result<BTreeMap<NodeId, ExternalId>, StorageError> {
        let tx = self.conn.transaction()?;
        let mut seen = BTreeSet::new();
        let mut created = BTreeMap::new();
        for spec in specs {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1)",
                params![spec.id.as_str()],
                |row| row.get(0),
            )?;
            if exists || !seen.insert(&spec.id) {
                // Dropping `tx` rolls back every row inserted so far.
                return Err(StorageError::DuplicateEntity(spec.id.clone()));
            }

            let external_id = ExternalId::generate();
            tx.execute(
                "INSERT INTO entities (id, external_id, entity_type, properties)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    spec.id.as_str(),
                    external_id.as_str(),
                    spec.entity_type,
                    serde_json::to_string(&spec.properties)?,
                ],
            )?;
            created.insert(spec.id.clone(), external_id);
        }
        tx.commit()?;
        tracing::info!(count = created.len(), "created entities");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::Value;

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::in_memory().unwrap();
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
    fn values_survive_json_storage() {
        let mut store = seeded();
        let bag = PropertyBag::from_iter([
            ("flag", Value::Bool(true)),
            ("ratio", Value::Float(2.0)),
            ("label", Value::from("x")),
            ("none", Value::Null),
        ]);
        store.write_properties("invoice_001", &bag).unwrap();

        let dump = store.load_properties(&["invoice_001".into()]).unwrap();
        let stored = &dump[&NodeId::from("invoice_001")];
        assert_eq!(stored.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(stored.get("ratio"), Some(&Value::Float(2.0)));
        assert_eq!(stored.get("label"), Some(&Value::from("x")));
        assert_eq!(stored.get("none"), Some(&Value::Null));
        assert_eq!(stored.get("tax_rate"), Some(&Value::Float(0.1)));
    }

    #[test]
    fn missing_ids_fail_full_load() {
        let store = seeded();
        let err = store
            .load_properties(&["order_001".into(), "nope".into()])
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingEntities(ids) if ids == vec![NodeId::from("nope")]));
    }

    #[test]
    fn duplicate_batch_rolls_back() {
        let mut store = seeded();
        let err = store
            .create_entities(&[
                EntitySpec::new("new_one", "Order"),
                EntitySpec::new("order_001", "Order"),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEntity(_)));
        let ids: Vec<_> = store
            .list_entities()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![NodeId::from("invoice_001"), NodeId::from("order_001")]);
    }

    #[test]
    fn writes_keep_the_external_id() {
        let mut store = SqliteStore::in_memory().unwrap();
        let created = store
            .create_entities(&[EntitySpec::new("order_001", "Order")])
            .unwrap();
        let minted = created[&NodeId::from("order_001")].clone();

        store
            .write_properties("order_001", &PropertyBag::from_iter([("price", 7)]))
            .unwrap();
        let listed = store.list_entities().unwrap();
        assert_eq!(listed[0].external_id, minted);
        assert_eq!(listed[0].property_count, 1);

        let err = store
            .write_properties(minted.as_str(), &PropertyBag::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::EntityNotFound(_)));
    }

    #[test]
    fn list_counts_properties() {
        let store = seeded();
        let listed = store.list_entities().unwrap();
        assert_eq!(listed[1].id, "order_001");
        assert_eq!(listed[1].entity_type, "Order");
        assert_eq!(listed[1].property_count, 2);
    }
}
