//! ComputationGraph: the immutable declarative model of a what-if analysis.
//!
//! [`ComputationGraph`] holds computation nodes keyed by id, relationships
//! keyed by id, and outgoing/incoming indices derived from the relationships.
//! Entities are not stored: any relationship endpoint that is not a
//! computation node id is an entity.
//!
//! The graph is never mutated in place. [`ComputationGraph::add_computation_node`]
//! and [`ComputationGraph::add_relationship`] return a new graph and leave the
//! receiver untouched. Nodes and relationships are held behind `Arc`, so the
//! copy only duplicates the maps. For bulk construction use [`GraphBuilder`],
//! which accumulates elements and freezes them with [`GraphBuilder::build`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::edge::{RelationKind, Relationship};
use crate::error::CoreError;
use crate::id::{NodeId, RelationshipId};
use crate::node::ComputationNode;

/// Immutable computation graph model.
///
/// Iteration over nodes and relationships follows insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct ComputationGraph {
    id: String,
    nodes: IndexMap<NodeId, Arc<ComputationNode>>,
    relationships: IndexMap<RelationshipId, Arc<Relationship>>,
    /// Relationship ids keyed by their source vertex.
    outgoing: HashMap<NodeId, Vec<RelationshipId>>,
    /// Relationship ids keyed by their target vertex.
    incoming: HashMap<NodeId, Vec<RelationshipId>>,
    /// Lazily derived entity id view, reset whenever a new graph is produced.
    entity_ids: OnceLock<BTreeSet<NodeId>>,
}

impl ComputationGraph {
    /// Creates an empty graph with the given model id.
    pub fn new(id: impl Into<String>) -> Self {
        ComputationGraph {
            id: id.into(),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Copy-on-write construction
    // -----------------------------------------------------------------------

    /// Returns a new graph that additionally contains `node`.
    ///
    /// Fails with [`CoreError::DuplicateNodeId`] if the id is taken; the
    /// receiver is never modified.
    pub fn add_computation_node(&self, node: ComputationNode) -> Result<Self, CoreError> {
        let mut next = self.derive();
        next.insert_node(node)?;
        Ok(next)
    }

    /// Returns a new graph that additionally contains `rel`.
    ///
    /// Fails with [`CoreError::DuplicateRelationshipId`] if the id is taken;
    /// the receiver is never modified.
    pub fn add_relationship(&self, rel: Relationship) -> Result<Self, CoreError> {
        let mut next = self.derive();
        next.insert_relationship(rel)?;
        Ok(next)
    }

    /// Clone with the cached entity view dropped.
    fn derive(&self) -> Self {
        let mut next = self.clone();
        next.entity_ids = OnceLock::new();
        next
    }

    fn insert_node(&mut self, node: ComputationNode) -> Result<(), CoreError> {
        if self.nodes.contains_key(&node.id) {
            return Err(CoreError::DuplicateNodeId { id: node.id });
        }
        self.nodes.insert(node.id.clone(), Arc::new(node));
        Ok(())
    }

    fn insert_relationship(&mut self, rel: Relationship) -> Result<(), CoreError> {
        if self.relationships.contains_key(&rel.id) {
            return Err(CoreError::DuplicateRelationshipId { id: rel.id });
        }
        self.outgoing
            .entry(rel.source.clone())
            .or_default()
            .push(rel.id.clone());
        self.incoming
            .entry(rel.target.clone())
            .or_default()
            .push(rel.id.clone());
        self.relationships.insert(rel.id.clone(), Arc::new(rel));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(&self, id: &str) -> Option<&ComputationNode> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Shared handle to a node, for holders that outlive a borrow of the graph.
    pub fn node_arc(&self, id: &str) -> Option<Arc<ComputationNode>> {
        self.nodes.get(id).cloned()
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.get(id).map(Arc::as_ref)
    }

    /// Computation nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ComputationNode> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// Relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values().map(Arc::as_ref)
    }

    pub fn is_computation(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Relationships whose source is `id`, in insertion order.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Relationship> {
        self.indexed(&self.outgoing, id)
    }

    /// Relationships whose target is `id`, in insertion order.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Relationship> {
        self.indexed(&self.incoming, id)
    }

    fn indexed<'a>(
        &'a self,
        index: &'a HashMap<NodeId, Vec<RelationshipId>>,
        id: &str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        index
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid).map(Arc::as_ref))
    }

    // -----------------------------------------------------------------------
    // Structural queries
    // -----------------------------------------------------------------------

    /// Computation nodes one READS hop upstream of `id`.
    pub fn dependencies_of(&self, id: &str) -> Vec<&ComputationNode> {
        self.incoming(id)
            .filter(|r| r.kind == RelationKind::Reads)
            .filter_map(|r| self.node(r.source.as_str()))
            .collect()
    }

    /// Computation nodes one WRITES hop downstream of `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&ComputationNode> {
        self.outgoing(id)
            .filter(|r| r.kind == RelationKind::Writes)
            .filter_map(|r| self.node(r.target.as_str()))
            .collect()
    }

    /// Every relationship endpoint that is not a computation node.
    ///
    /// Computed on first use and cached for the lifetime of this graph value.
    pub fn entity_ids(&self) -> &BTreeSet<NodeId> {
        self.entity_ids.get_or_init(|| {
            self.relationships
                .values()
                .flat_map(|r| match r.kind {
                    RelationKind::Reads => [&r.source].into_iter(),
                    RelationKind::Writes => [&r.target].into_iter(),
                })
                .filter(|id| !self.nodes.contains_key(*id))
                .cloned()
                .collect()
        })
    }

    /// Entity id to the property names WRITES edges declare on it.
    ///
    /// Property names are listed once each, in first-declared order.
    pub fn declared_outputs_by_entity(&self) -> BTreeMap<NodeId, Vec<String>> {
        let mut outputs: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
        for rel in self.relationships.values() {
            if rel.kind != RelationKind::Writes || self.is_computation(rel.target.as_str()) {
                continue;
            }
            let props = outputs.entry(rel.target.clone()).or_default();
            if !props.contains(&rel.property) {
                props.push(rel.property.clone());
            }
        }
        outputs
    }

    /// Checks that every READS targets, and every WRITES originates from, a
    /// computation node.
    pub fn validate(&self) -> Result<(), CoreError> {
        for rel in self.relationships.values() {
            let (endpoint, role) = match rel.kind {
                RelationKind::Reads => (&rel.target, "target"),
                RelationKind::Writes => (&rel.source, "source"),
            };
            if !self.is_computation(endpoint.as_str()) {
                return Err(CoreError::InvalidRelationship {
                    id: rel.id.clone(),
                    reason: format!(
                        "{} {role} '{endpoint}' is not a computation node",
                        rel.kind
                    ),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

/// Accumulates nodes and relationships, then freezes them into a
/// [`ComputationGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: ComputationGraph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        GraphBuilder {
            graph: ComputationGraph::new(id),
        }
    }

    /// Starts from an existing graph.
    pub fn extend(graph: &ComputationGraph) -> Self {
        GraphBuilder {
            graph: graph.derive(),
        }
    }

    pub fn node(&mut self, node: ComputationNode) -> Result<&mut Self, CoreError> {
        self.graph.insert_node(node)?;
        Ok(self)
    }

    pub fn relationship(&mut self, rel: Relationship) -> Result<&mut Self, CoreError> {
        self.graph.insert_relationship(rel)?;
        Ok(self)
    }

    /// Convenience for a READS relationship.
    pub fn reads(
        &mut self,
        id: impl Into<RelationshipId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        property: impl Into<String>,
    ) -> Result<&mut Self, CoreError> {
        self.relationship(Relationship::reads(id, source, target, property))
    }

    /// Convenience for a WRITES relationship.
    pub fn writes(
        &mut self,
        id: impl Into<RelationshipId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        property: impl Into<String>,
    ) -> Result<&mut Self, CoreError> {
        self.relationship(Relationship::writes(id, source, target, property))
    }

    pub fn build(self) -> ComputationGraph {
        self.graph
    }
}

// ---------------------------------------------------------------------------
// Serialized form
// ---------------------------------------------------------------------------

/// Flat, serializable form of a graph: node and relationship lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<ComputationNode>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl TryFrom<GraphDocument> for ComputationGraph {
    type Error = CoreError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut builder = GraphBuilder::new(doc.id);
        for node in doc.nodes {
            builder.node(node)?;
        }
        for rel in doc.relationships {
            builder.relationship(rel)?;
        }
        Ok(builder.build())
    }
}

impl From<ComputationGraph> for GraphDocument {
    fn from(graph: ComputationGraph) -> Self {
        GraphDocument {
            nodes: graph.nodes().cloned().collect(),
            relationships: graph.relationships().cloned().collect(),
            id: graph.id,
        }
    }
}
