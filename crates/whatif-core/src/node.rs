//! Computation node definitions.
//!
//! A [`ComputationNode`] is one step of the what-if model: it reads entity
//! properties through its [`InputBinding`]s, evaluates an expression, and
//! hands the result to every entity it WRITES to. Input and output bindings
//! are declarative; the relationships in the graph decide which concrete
//! entities are read and written.

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Which evaluator a computation node is meant for.
///
/// Only [`EngineKind::Expression`] is executable. The other tags are accepted
/// in models so they can be declared, but evaluating them records a node
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Expression,
    GraphQuery,
    External,
}

/// Granularity a computation operates at. Descriptive only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationLevel {
    #[default]
    Property,
    Node,
    Graph,
}

/// One declared input of a computation node.
///
/// The value bound to `variable` is the current value of `property` on the
/// entity that a matching READS relationship points from. When `entity_id`
/// is set only a READS edge from that exact entity matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    /// Name the value is bound to inside the expression.
    pub variable: String,
    /// Entity type the value comes from. Descriptive only.
    #[serde(default)]
    pub entity_type: String,
    /// Property to read.
    pub property: String,
    /// Restricts the binding to a single source entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<NodeId>,
}

impl InputBinding {
    /// Creates a binding whose variable name equals the property name.
    pub fn new(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        let property = property.into();
        InputBinding {
            variable: property.clone(),
            entity_type: entity_type.into(),
            property,
            entity_id: None,
        }
    }

    /// Binds the value under a different variable name.
    pub fn named(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    /// Restricts the binding to one source entity.
    pub fn from_entity(mut self, id: impl Into<NodeId>) -> Self {
        self.entity_id = Some(id.into());
        self
    }
}

/// One declared output of a computation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    #[serde(default)]
    pub entity_type: String,
    pub property: String,
}

impl OutputBinding {
    pub fn new(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        OutputBinding {
            entity_type: entity_type.into(),
            property: property.into(),
        }
    }
}

/// A single computation step of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub level: ComputationLevel,
    #[serde(default)]
    pub inputs: Vec<InputBinding>,
    #[serde(default)]
    pub outputs: Vec<OutputBinding>,
    /// Source of the expression, parsed once per engine.
    pub expression: String,
    #[serde(default)]
    pub engine: EngineKind,
    /// Tie-break among nodes that are ready at the same time; lower runs first.
    #[serde(default)]
    pub priority: i64,
}

impl ComputationNode {
    /// Creates an expression node with no bindings and priority 0.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        ComputationNode {
            id: id.into(),
            name: name.into(),
            level: ComputationLevel::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            expression: expression.into(),
            engine: EngineKind::default(),
            priority: 0,
        }
    }

    pub fn with_input(mut self, input: InputBinding) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: OutputBinding) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_level(mut self, level: ComputationLevel) -> Self {
        self.level = level;
        self
    }

    /// Declared input bindings that read `property`.
    pub fn inputs_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a InputBinding> {
        self.inputs.iter().filter(move |b| b.property == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_accumulate() {
        let node = ComputationNode::new("calc_subtotal", "Subtotal", "price * quantity")
            .with_input(InputBinding::new("Order", "price"))
            .with_input(InputBinding::new("Order", "quantity").named("qty"))
            .with_output(OutputBinding::new("Invoice", "subtotal"))
            .with_priority(3);

        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.inputs[1].variable, "qty");
        assert_eq!(node.inputs[1].property, "quantity");
        assert_eq!(node.outputs[0].property, "subtotal");
        assert_eq!(node.priority, 3);
        assert_eq!(node.engine, EngineKind::Expression);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "id": "calc_tax",
            "name": "Tax",
            "inputs": [{"variable": "rate", "property": "tax_rate"}],
            "outputs": [{"property": "tax"}],
            "expression": "subtotal * rate"
        }"#;
        let node: ComputationNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "calc_tax");
        assert_eq!(node.priority, 0);
        assert_eq!(node.level, ComputationLevel::Property);
        assert_eq!(node.engine, EngineKind::Expression);
        assert!(node.inputs[0].entity_id.is_none());
    }

    #[test]
    fn engine_tags_use_snake_case() {
        let json = serde_json::to_string(&EngineKind::GraphQuery).unwrap();
        assert_eq!(json, "\"graph_query\"");
    }

    #[test]
    fn inputs_for_filters_by_property() {
        let node = ComputationNode::new("n", "n", "a + b")
            .with_input(InputBinding::new("T", "x").named("a").from_entity("e1"))
            .with_input(InputBinding::new("T", "x").named("b").from_entity("e2"))
            .with_input(InputBinding::new("T", "y"));
        let vars: Vec<_> = node.inputs_for("x").map(|b| b.variable.as_str()).collect();
        assert_eq!(vars, vec!["a", "b"]);
    }
}
