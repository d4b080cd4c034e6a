//! Dependency resolution.
//!
//! Orders computation nodes so that every value a node reads has already been
//! produced. Two kinds of constraints apply:
//!
//! - **Explicit**: a READS or WRITES edge between two computation nodes runs
//!   its source before its target.
//! - **Writer before reader**: if node A WRITES property `p` of entity `e` and
//!   node B READS `p` from `e` (with A != B), A runs before B.
//!
//! READS from an entity impose nothing on their own: entities are always
//! ready. Among nodes that are ready at the same time the one with the lowest
//! `(priority, id)` runs first, so the order is total and deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use whatif_core::{NodeId, RelationKind};

use super::error::EngineError;
use super::exec_graph::{ExecGraph, Vertex};

/// Why one node must run before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Explicit,
    WriterBeforeReader,
}

/// Builds the node-to-node constraint graph over computation nodes.
pub fn dependency_graph(exec: &ExecGraph) -> DiGraph<NodeId, Constraint> {
    let mut deps: DiGraph<NodeId, Constraint> = DiGraph::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    for node in exec.computations() {
        index.insert(node.id.clone(), deps.add_node(node.id.clone()));
    }

    // Explicit computation-to-computation edges.
    for node in exec.computations() {
        for (target, _) in exec.outbound(node.id.as_str()) {
            if let Vertex::Computation(t) = target {
                deps.update_edge(index[&node.id], index[&t.id], Constraint::Explicit);
            }
        }
    }

    // Writer-before-reader edges through each entity.
    for entity in exec.entities() {
        let writers: Vec<_> = exec
            .inbound(entity.as_str())
            .into_iter()
            .filter(|(_, e)| e.kind == RelationKind::Writes)
            .filter_map(|(v, e)| v.as_computation().map(|n| (&n.id, e)))
            .collect();
        if writers.is_empty() {
            continue;
        }
        for (reader, read) in exec.outbound(entity.as_str()) {
            let Some(reader) = reader.as_computation() else {
                continue;
            };
            if read.kind != RelationKind::Reads {
                continue;
            }
            for (writer, write) in &writers {
                if write.property != read.property || **writer == reader.id {
                    continue;
                }
                let (w, r) = (index[*writer], index[&reader.id]);
                if deps.find_edge(w, r).is_none() {
                    tracing::debug!(
                        writer = %writer,
                        reader = %reader.id,
                        entity = %entity,
                        property = %read.property,
                        "inferred writer-before-reader dependency"
                    );
                    deps.add_edge(w, r, Constraint::WriterBeforeReader);
                }
            }
        }
    }

    deps
}

/// Resolves a total execution order over the computation nodes of `exec`.
///
/// Fails with [`EngineError::CycleDetected`] naming the nodes of a cycle when
/// no order exists.
pub fn resolve_order(exec: &ExecGraph) -> Result<Vec<NodeId>, EngineError> {
    let deps = dependency_graph(exec);
    let priority: HashMap<&NodeId, i64> = exec.computations().map(|n| (&n.id, n.priority)).collect();
    let key = |idx: NodeIndex| {
        let id = &deps[idx];
        Reverse((priority.get(id).copied().unwrap_or(0), id.clone(), idx))
    };

    let mut in_degree: Vec<usize> = deps
        .node_indices()
        .map(|idx| deps.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<_> = deps
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .map(key)
        .collect();

    let mut order = Vec::with_capacity(deps.node_count());
    while let Some(Reverse((_, id, idx))) = ready.pop() {
        order.push(id);
        for next in deps.neighbors_directed(idx, Direction::Outgoing) {
            let deg = &mut in_degree[next.index()];
            *deg -= 1;
            if *deg == 0 {
                ready.push(key(next));
            }
        }
    }

    if order.len() < deps.node_count() {
        let nodes = cycle_members(&deps);
        tracing::error!(nodes = ?nodes, "dependency cycle detected; refusing to execute");
        return Err(EngineError::CycleDetected { nodes });
    }

    let rendered = order.iter().map(NodeId::as_str).collect::<Vec<_>>().join(" -> ");
    tracing::info!(order = %rendered, "resolved execution order");
    Ok(order)
}

/// Nodes of the first cycle found, sorted by id.
fn cycle_members(deps: &DiGraph<NodeId, Constraint>) -> Vec<NodeId> {
    let mut members = tarjan_scc(deps)
        .into_iter()
        .find(|scc| scc.len() > 1 || deps.contains_edge(scc[0], scc[0]))
        .map(|scc| scc.into_iter().map(|idx| deps[idx].clone()).collect::<Vec<_>>())
        .unwrap_or_default();
    members.sort();
    members
}
