//! The execution-ready graph.
//!
//! [`ExecGraph`] merges a [`ComputationGraph`] with the entities of an
//! [`ExecutionState`] into a petgraph multigraph: one vertex per computation
//! node and one per entity, one edge per READS/WRITES relationship annotated
//! with its property. Entity vertices only carry the entity id; property
//! values are looked up in the engine-owned state when a node is evaluated,
//! so a write is visible to every later read in the same pass.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use whatif_core::{
    ComputationGraph, ComputationNode, ExecutionState, NodeId, RelationKind, RelationshipId,
};

use super::error::EngineError;

/// A vertex of the execution graph.
#[derive(Debug, Clone)]
pub enum Vertex {
    Computation(Arc<ComputationNode>),
    Entity(NodeId),
}

impl Vertex {
    pub fn id(&self) -> &NodeId {
        match self {
            Vertex::Computation(node) => &node.id,
            Vertex::Entity(id) => id,
        }
    }

    pub fn as_computation(&self) -> Option<&ComputationNode> {
        match self {
            Vertex::Computation(node) => Some(node.as_ref()),
            Vertex::Entity(_) => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Vertex::Entity(_))
    }
}

/// An edge of the execution graph, mirroring one relationship.
#[derive(Debug, Clone)]
pub struct ExecEdge {
    pub relationship: RelationshipId,
    pub kind: RelationKind,
    pub property: String,
    /// Position of the relationship in the model; orders edge iteration.
    pub ordinal: usize,
}

/// Execution multigraph over computation and entity vertices.
#[derive(Debug, Clone)]
pub struct ExecGraph {
    graph: StableGraph<Vertex, ExecEdge, Directed, u32>,
    index: HashMap<NodeId, NodeIndex<u32>>,
}

impl ExecGraph {
    /// Builds the execution graph.
    ///
    /// Fails with [`EngineError::InvalidRelationship`] when a READS does not
    /// target, or a WRITES does not originate from, a computation node, and
    /// with [`EngineError::UnknownEntity`] when the model references an entity
    /// `state` does not contain. Entities are never created here.
    pub fn build(model: &ComputationGraph, state: &ExecutionState) -> Result<Self, EngineError> {
        model.validate()?;

        let mut graph = StableGraph::default();
        let mut index = HashMap::new();

        for node in model.nodes() {
            if let Some(arc) = model.node_arc(node.id.as_str()) {
                let idx = graph.add_node(Vertex::Computation(arc));
                index.insert(node.id.clone(), idx);
            }
        }
        for entity in model.entity_ids() {
            if !state.contains_entity(entity.as_str()) {
                return Err(EngineError::UnknownEntity { id: entity.clone() });
            }
            let idx = graph.add_node(Vertex::Entity(entity.clone()));
            index.insert(entity.clone(), idx);
        }

        for (ordinal, rel) in model.relationships().enumerate() {
            let (Some(&src), Some(&dst)) = (index.get(&rel.source), index.get(&rel.target)) else {
                // validate() guarantees both endpoints are vertices.
                continue;
            };
            graph.add_edge(
                src,
                dst,
                ExecEdge {
                    relationship: rel.id.clone(),
                    kind: rel.kind,
                    property: rel.property.clone(),
                    ordinal,
                },
            );
        }

        Ok(ExecGraph { graph, index })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.index.get(id).and_then(|idx| self.graph.node_weight(*idx))
    }

    /// Computation nodes in model order.
    pub fn computations(&self) -> impl Iterator<Item = &ComputationNode> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph[idx].as_computation())
    }

    pub fn entities(&self) -> impl Iterator<Item = &NodeId> {
        self.vertices().filter(|v| v.is_entity()).map(Vertex::id)
    }

    fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Edges into `id` with their source vertex, in model order.
    pub fn inbound(&self, id: &str) -> Vec<(&Vertex, &ExecEdge)> {
        self.adjacent(id, Direction::Incoming)
    }

    /// Edges out of `id` with their target vertex, in model order.
    pub fn outbound(&self, id: &str) -> Vec<(&Vertex, &ExecEdge)> {
        self.adjacent(id, Direction::Outgoing)
    }

    fn adjacent(&self, id: &str, dir: Direction) -> Vec<(&Vertex, &ExecEdge)> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (&self.graph[other], e.weight())
            })
            .collect();
        edges.sort_by_key(|(_, e)| e.ordinal);
        edges
    }

    pub fn computation_count(&self) -> usize {
        self.vertices().filter(|v| !v.is_entity()).count()
    }

    pub fn entity_count(&self) -> usize {
        self.vertices().filter(|v| v.is_entity()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::{GraphBuilder, PropertyBag};

    fn model() -> ComputationGraph {
        let mut b = GraphBuilder::new("m");
        b.node(ComputationNode::new("calc", "Calc", "a + b")).unwrap();
        b.reads("r1", "e1", "calc", "a").unwrap();
        b.reads("r2", "e1", "calc", "b").unwrap();
        b.writes("w1", "calc", "e2", "sum").unwrap();
        b.build()
    }

    fn state() -> ExecutionState {
        ExecutionState::new()
            .with_entity("e1", PropertyBag::from_iter([("a", 1), ("b", 2)]))
            .with_entity("e2", PropertyBag::new())
    }

    #[test]
    fn one_vertex_per_node_and_entity() {
        let g = ExecGraph::build(&model(), &state()).unwrap();
        assert_eq!(g.computation_count(), 1);
        assert_eq!(g.entity_count(), 2);
        assert_eq!(g.edge_count(), 3);
        assert!(g.vertex("e1").unwrap().is_entity());
        assert!(g.vertex("calc").unwrap().as_computation().is_some());
    }

    #[test]
    fn inbound_edges_follow_model_order() {
        let g = ExecGraph::build(&model(), &state()).unwrap();
        let props: Vec<_> = g.inbound("calc").iter().map(|(_, e)| e.property.as_str()).collect();
        assert_eq!(props, vec!["a", "b"]);
        let out: Vec<_> = g.outbound("calc").iter().map(|(v, _)| v.id().as_str()).collect();
        assert_eq!(out, vec!["e2"]);
    }

    #[test]
    fn missing_entity_is_rejected() {
        let partial = ExecutionState::new().with_entity("e1", PropertyBag::new());
        let err = ExecGraph::build(&model(), &partial).unwrap_err();
        assert_eq!(err, EngineError::UnknownEntity { id: "e2".into() });
    }

    #[test]
    fn writes_from_entity_is_invalid() {
        let mut b = GraphBuilder::new("bad");
        b.node(ComputationNode::new("calc", "Calc", "1")).unwrap();
        b.writes("w", "e1", "calc", "x").unwrap();
        let err = ExecGraph::build(&b.build(), &state()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRelationship { .. }));
    }
}
