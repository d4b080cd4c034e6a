//! Execution state: the mutable entity property store.
//!
//! [`ExecutionState`] maps entity ids to [`PropertyBag`]s. It is the only
//! mutable structure in a what-if run. Reading a property that is not present
//! yields `None` from [`PropertyBag::get`] and [`Value::Null`] from
//! [`PropertyBag::get_or_null`]; missing properties are never an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::value::Value;

/// Full copy of every entity's property bag, keyed by entity id.
pub type StateDump = BTreeMap<NodeId, PropertyBag>;

/// Property name to value for a single entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, Value>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    /// Current value of `property`, or `Null` when absent.
    pub fn get_or_null(&self, property: &str) -> Value {
        self.0.get(property).cloned().unwrap_or_default()
    }

    /// Sets `property`, returning the previous value.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(property.into(), value.into())
    }

    pub fn contains(&self, property: &str) -> bool {
        self.0.contains_key(property)
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.0.remove(property)
    }

    /// Copies every property of `other` into this bag, overwriting on collision.
    pub fn merge(&mut self, other: &PropertyBag) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for PropertyBag {
    fn from(map: BTreeMap<String, Value>) -> Self {
        PropertyBag(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PropertyBag(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a PropertyBag {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// ExecutionState
// ---------------------------------------------------------------------------

/// Entity id to property bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionState {
    entities: StateDump,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity, replacing any existing bag with the same id.
    pub fn insert_entity(&mut self, id: impl Into<NodeId>, bag: PropertyBag) -> Option<PropertyBag> {
        self.entities.insert(id.into(), bag)
    }

    /// Builder form of [`ExecutionState::insert_entity`].
    pub fn with_entity(mut self, id: impl Into<NodeId>, bag: PropertyBag) -> Self {
        self.insert_entity(id, bag);
        self
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entity(&self, id: &str) -> Option<&PropertyBag> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut PropertyBag> {
        self.entities.get_mut(id)
    }

    /// Value of `property` on `entity`, if both exist.
    pub fn get(&self, entity: &str, property: &str) -> Option<&Value> {
        self.entities.get(entity).and_then(|bag| bag.get(property))
    }

    /// Sets a property on an existing entity. Entities are never created here.
    pub fn set(
        &mut self,
        entity: &str,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, CoreError> {
        let bag = self
            .entities
            .get_mut(entity)
            .ok_or_else(|| CoreError::EntityNotFound { id: entity.into() })?;
        Ok(bag.set(property, value))
    }

    /// Removes a property from an existing entity.
    pub fn remove(&mut self, entity: &str, property: &str) -> Result<Option<Value>, CoreError> {
        let bag = self
            .entities
            .get_mut(entity)
            .ok_or_else(|| CoreError::EntityNotFound { id: entity.into() })?;
        Ok(bag.remove(property))
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &PropertyBag)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Deep copy of every bag.
    pub fn dump(&self) -> StateDump {
        self.entities.clone()
    }

    /// Replaces the bags of the entities present in `dump`.
    ///
    /// Entities absent from `dump` are left as they are.
    pub fn replace_from(&mut self, dump: &StateDump) {
        for (id, bag) in dump {
            match self.entities.get_mut(id) {
                Some(live) => live.clone_from(bag),
                None => {
                    self.entities.insert(id.clone(), bag.clone());
                }
            }
        }
    }

    pub fn into_dump(self) -> StateDump {
        self.entities
    }
}

impl From<StateDump> for ExecutionState {
    fn from(entities: StateDump) -> Self {
        ExecutionState { entities }
    }
}

impl<K: Into<NodeId>> FromIterator<(K, PropertyBag)> for ExecutionState {
    fn from_iter<I: IntoIterator<Item = (K, PropertyBag)>>(iter: I) -> Self {
        ExecutionState {
            entities: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
