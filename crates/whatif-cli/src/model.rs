//! Model files: a computation graph plus the entities it runs against.
//!
//! ```json
//! {
//!   "id": "invoice",
//!   "nodes": [ { "id": "calc_subtotal", "name": "Subtotal", "expression": "price * quantity" } ],
//!   "relationships": [
//!     { "id": "r1", "source": "order_001", "target": "calc_subtotal", "kind": "READS", "property": "price" }
//!   ],
//!   "entities": { "order_001": { "price": 100, "quantity": 5 } },
//!   "entity_types": { "order_001": "Order" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use whatif_core::{
    ComputationGraph, ComputationNode, CoreError, ExecutionState, GraphDocument, NodeId,
    PropertyBag, Relationship, Value,
};
use whatif_engine::Override;
use whatif_storage::EntitySpec;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid model file '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Graph(#[from] CoreError),

    #[error("invalid override '{0}': expected entity.property=value")]
    Override(String),
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    id: String,
    #[serde(default)]
    nodes: Vec<ComputationNode>,
    #[serde(default)]
    relationships: Vec<Relationship>,
    #[serde(default)]
    entities: BTreeMap<NodeId, PropertyBag>,
    #[serde(default)]
    entity_types: BTreeMap<NodeId, String>,
}

/// A loaded model.
#[derive(Debug)]
pub struct Model {
    pub graph: ComputationGraph,
    pub entities: BTreeMap<NodeId, PropertyBag>,
    pub entity_types: BTreeMap<NodeId, String>,
}

impl Model {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: display.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|err| match err {
            ModelError::Json { source, .. } => ModelError::Json {
                path: display,
                source,
            },
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(text).map_err(|source| ModelError::Json {
            path: String::new(),
            source,
        })?;
        let graph = ComputationGraph::try_from(GraphDocument {
            id: file.id,
            nodes: file.nodes,
            relationships: file.relationships,
        })?;
        Ok(Model {
            graph,
            entities: file.entities,
            entity_types: file.entity_types,
        })
    }

    /// Initial state from the model's inline entities.
    pub fn state(&self) -> ExecutionState {
        self.entities
            .iter()
            .map(|(id, bag)| (id.clone(), bag.clone()))
            .collect()
    }

    /// Creation specs for every inline entity.
    pub fn entity_specs(&self) -> Vec<EntitySpec> {
        self.entities
            .iter()
            .map(|(id, bag)| {
                let entity_type = self.entity_types.get(id).cloned().unwrap_or_default();
                EntitySpec::new(id.clone(), entity_type).with_properties(bag.clone())
            })
            .collect()
    }
}

/// Parses `entity.property=value`.
///
/// The value is read as JSON when it parses as JSON and as a plain string
/// otherwise, so `price=150` is an integer and `status=late` a string.
pub fn parse_override(raw: &str) -> Result<Override, ModelError> {
    let invalid = || ModelError::Override(raw.to_string());
    let (target, value) = raw.split_once('=').ok_or_else(invalid)?;
    let (entity, property) = target.trim().rsplit_once('.').ok_or_else(invalid)?;
    if entity.is_empty() || property.is_empty() {
        return Err(invalid());
    }
    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::from(value.trim()));
    Ok(Override::new(entity, property, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "id": "invoice",
        "nodes": [
            {
                "id": "calc_subtotal",
                "name": "Subtotal",
                "expression": "price * quantity",
                "inputs": [
                    { "variable": "price", "entity_type": "Order", "property": "price" },
                    { "variable": "quantity", "entity_type": "Order", "property": "quantity" }
                ],
                "outputs": [ { "entity_type": "Invoice", "property": "subtotal" } ]
            }
        ],
        "relationships": [
            { "id": "r1", "source": "order_001", "target": "calc_subtotal", "kind": "READS", "property": "price" },
            { "id": "r2", "source": "order_001", "target": "calc_subtotal", "kind": "READS", "property": "quantity" },
            { "id": "w1", "source": "calc_subtotal", "target": "invoice_001", "kind": "WRITES", "property": "subtotal" }
        ],
        "entities": {
            "order_001": { "price": 100, "quantity": 5 },
            "invoice_001": {}
        },
        "entity_types": { "order_001": "Order" }
    }"#;

    #[test]
    fn parses_graph_and_entities() {
        let model = Model::parse(MODEL).unwrap();
        assert_eq!(model.graph.node_count(), 1);
        assert_eq!(model.graph.relationship_count(), 3);
        let state = model.state();
        assert_eq!(state.get("order_001", "price"), Some(&Value::Int(100)));

        let specs = model.entity_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].id, "order_001");
        assert_eq!(specs[1].entity_type, "Order");
        assert_eq!(specs[0].entity_type, "");
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let text = r#"{
            "nodes": [
                { "id": "n", "name": "A", "expression": "1" },
                { "id": "n", "name": "B", "expression": "2" }
            ]
        }"#;
        assert!(matches!(
            Model::parse(text),
            Err(ModelError::Graph(CoreError::DuplicateNodeId { .. }))
        ));
    }

    #[test]
    fn override_values() {
        let o = parse_override("order_001.price=150").unwrap();
        assert_eq!(o, Override::new("order_001", "price", 150));

        let o = parse_override("ship.v2.status = late").unwrap();
        assert_eq!(o.entity, "ship.v2");
        assert_eq!(o.value, Value::from("late"));

        let o = parse_override("plan.rate=0.25").unwrap();
        assert_eq!(o.value, Value::Float(0.25));

        assert!(parse_override("no_equals").is_err());
        assert!(parse_override("noproperty=1").is_err());
    }
}
