//! Per-node evaluation: input binding, expression evaluation, output fan-out.
//!
//! Values reach a node only along its inbound edges:
//!
//! - a READS edge from an entity supplies that entity's current value of the
//!   edge property, or `Null` when the property is missing;
//! - a READS or WRITES edge from another computation node supplies that
//!   node's result from the current pass, or `Null` if it has none.
//!
//! A declared [`InputBinding`](whatif_core::InputBinding) whose property
//! matches the edge (and whose `entity_id`, if set, matches the source) binds
//! the value under its variable name. An edge no input declares binds under
//! the property name. When several edges bind the same variable the first one
//! in model order wins. Declared inputs left without an edge bind `Null`.

use std::collections::HashMap;

use whatif_core::{
    ComputationGraph, ComputationNode, CoreError, EngineKind, ExecutionState, NodeId,
    RelationKind, Value,
};

use super::error::EvalFailure;
use super::exec_graph::{ExecGraph, Vertex};
use crate::expr::{evaluate, parse, Bindings, Expr, ExprError};

/// Parsed expressions keyed by node id. Parse failures are kept so every pass
/// reports them.
pub type CompiledExprs = HashMap<NodeId, Result<Expr, ExprError>>;

/// Parses every expression node of `graph` once.
pub fn compile_all(graph: &ComputationGraph, max_depth: usize) -> CompiledExprs {
    graph
        .nodes()
        .filter(|n| n.engine == EngineKind::Expression)
        .map(|n| (n.id.clone(), parse(&n.expression, max_depth)))
        .collect()
}

/// Builds the variable bindings for `node`.
pub fn bind_inputs(
    node: &ComputationNode,
    exec: &ExecGraph,
    state: &ExecutionState,
    results: &HashMap<NodeId, Value>,
) -> Bindings {
    let mut bindings = Bindings::new();

    for (source, edge) in exec.inbound(node.id.as_str()) {
        let value = match source {
            Vertex::Entity(id) if edge.kind == RelationKind::Reads => state
                .get(id.as_str(), &edge.property)
                .cloned()
                .unwrap_or_default(),
            Vertex::Computation(upstream) => {
                results.get(&upstream.id).cloned().unwrap_or_default()
            }
            // validate() rules out WRITES from an entity.
            Vertex::Entity(_) => continue,
        };

        let mut declared = node
            .inputs_for(&edge.property)
            .filter(|b| b.entity_id.as_ref().map_or(true, |id| id == source.id()))
            .peekable();
        if declared.peek().is_none() {
            bindings.entry(edge.property.clone()).or_insert(value);
            continue;
        }
        for binding in declared {
            bindings
                .entry(binding.variable.clone())
                .or_insert_with(|| value.clone());
        }
    }

    for binding in &node.inputs {
        bindings.entry(binding.variable.clone()).or_default();
    }
    bindings
}

/// Evaluates `node` against `bindings`.
pub fn evaluate_node(
    node: &ComputationNode,
    compiled: &CompiledExprs,
    bindings: &Bindings,
    max_steps: usize,
) -> Result<Value, EvalFailure> {
    if node.engine != EngineKind::Expression {
        return Err(EvalFailure::UnsupportedEngine(node.engine));
    }
    let expr = match compiled.get(&node.id) {
        Some(Ok(expr)) => expr,
        Some(Err(err)) => return Err(err.clone().into()),
        None => {
            return Err(ExprError::parse(0, "expression was not compiled").into());
        }
    };
    if let Some(name) = expr
        .free_variables()
        .into_iter()
        .find(|v| !bindings.contains_key(v))
    {
        return Err(ExprError::UnknownVariable { name }.into());
    }
    Ok(evaluate(expr, bindings, max_steps)?)
}

/// Writes `value` to every entity `node` WRITES to. Returns the number of
/// properties written.
pub fn write_outputs(
    node: &ComputationNode,
    value: &Value,
    exec: &ExecGraph,
    state: &mut ExecutionState,
) -> Result<usize, CoreError> {
    let mut written = 0;
    for (target, edge) in exec.outbound(node.id.as_str()) {
        if let (Vertex::Entity(id), RelationKind::Writes) = (target, edge.kind) {
            state.set(id.as_str(), edge.property.clone(), value.clone())?;
            written += 1;
        }
    }
    Ok(written)
}

/// Removes every property `node` WRITES to.
pub fn clear_outputs(
    node: &ComputationNode,
    exec: &ExecGraph,
    state: &mut ExecutionState,
) -> Result<(), CoreError> {
    for (target, edge) in exec.outbound(node.id.as_str()) {
        if let (Vertex::Entity(id), RelationKind::Writes) = (target, edge.kind) {
            state.remove(id.as_str(), &edge.property)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::{GraphBuilder, InputBinding, PropertyBag};

    fn setup(
        node: ComputationNode,
        edges: impl FnOnce(&mut GraphBuilder),
    ) -> (ComputationGraph, ExecutionState) {
        let mut b = GraphBuilder::new("t");
        b.node(node).unwrap();
        edges(&mut b);
        let state = ExecutionState::new()
            .with_entity("e1", PropertyBag::from_iter([("x", 1), ("y", 2)]))
            .with_entity("e2", PropertyBag::from_iter([("x", 10)]))
            .with_entity("out", PropertyBag::new());
        (b.build(), state)
    }

    #[test]
    fn declared_variable_names_apply() {
        let node = ComputationNode::new("n", "N", "a + b")
            .with_input(InputBinding::new("E", "x").named("a"))
            .with_input(InputBinding::new("E", "y").named("b"));
        let (g, state) = setup(node, |b| {
            b.reads("r1", "e1", "n", "x").unwrap();
            b.reads("r2", "e1", "n", "y").unwrap();
        });
        let exec = ExecGraph::build(&g, &state).unwrap();
        let bindings = bind_inputs(g.node("n").unwrap(), &exec, &state, &HashMap::new());
        assert_eq!(bindings.get("a"), Some(&Value::Int(1)));
        assert_eq!(bindings.get("b"), Some(&Value::Int(2)));
        assert!(!bindings.contains_key("x"));
    }

    #[test]
    fn entity_restricted_inputs_pick_their_source() {
        let node = ComputationNode::new("n", "N", "left - right")
            .with_input(InputBinding::new("E", "x").named("left").from_entity("e2"))
            .with_input(InputBinding::new("E", "x").named("right").from_entity("e1"));
        let (g, state) = setup(node, |b| {
            b.reads("r1", "e1", "n", "x").unwrap();
            b.reads("r2", "e2", "n", "x").unwrap();
        });
        let exec = ExecGraph::build(&g, &state).unwrap();
        let bindings = bind_inputs(g.node("n").unwrap(), &exec, &state, &HashMap::new());
        assert_eq!(bindings.get("left"), Some(&Value::Int(10)));
        assert_eq!(bindings.get("right"), Some(&Value::Int(1)));
    }

    #[test]
    fn missing_property_and_missing_edge_bind_null() {
        let node = ComputationNode::new("n", "N", "coalesce(z, w, 0)")
            .with_input(InputBinding::new("E", "z"))
            .with_input(InputBinding::new("E", "w"));
        let (g, state) = setup(node, |b| {
            b.reads("r1", "e1", "n", "z").unwrap();
        });
        let exec = ExecGraph::build(&g, &state).unwrap();
        let bindings = bind_inputs(g.node("n").unwrap(), &exec, &state, &HashMap::new());
        assert_eq!(bindings.get("z"), Some(&Value::Null));
        assert_eq!(bindings.get("w"), Some(&Value::Null));
    }

    #[test]
    fn upstream_results_flow_through_computation_edges() {
        let mut b = GraphBuilder::new("chain");
        b.node(ComputationNode::new("base", "Base", "40")).unwrap();
        b.node(ComputationNode::new("plus", "Plus", "base + 2")).unwrap();
        b.reads("r", "base", "plus", "base").unwrap();
        let g = b.build();
        let state = ExecutionState::new();
        let exec = ExecGraph::build(&g, &state).unwrap();
        let compiled = compile_all(&g, 64);

        let mut results = HashMap::new();
        results.insert(NodeId::from("base"), Value::Int(40));
        let node = g.node("plus").unwrap();
        let bindings = bind_inputs(node, &exec, &state, &results);
        assert_eq!(
            evaluate_node(node, &compiled, &bindings, 100).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn undeclared_free_variable_fails_even_if_unreached() {
        let node = ComputationNode::new("n", "N", "if true then 1 else typo");
        let (g, state) = setup(node, |_| {});
        let exec = ExecGraph::build(&g, &state).unwrap();
        let compiled = compile_all(&g, 64);
        let node = g.node("n").unwrap();
        let bindings = bind_inputs(node, &exec, &state, &HashMap::new());
        let err = evaluate_node(node, &compiled, &bindings, 100).unwrap_err();
        assert_eq!(
            err,
            EvalFailure::Expression(ExprError::UnknownVariable { name: "typo".into() })
        );
    }

    #[test]
    fn placeholder_engines_are_not_executable() {
        let node = ComputationNode::new("q", "Query", "MATCH (n) RETURN n")
            .with_engine(EngineKind::GraphQuery);
        let (g, _) = setup(node, |_| {});
        let compiled = compile_all(&g, 64);
        assert!(compiled.is_empty());
        let err = evaluate_node(g.node("q").unwrap(), &compiled, &Bindings::new(), 100).unwrap_err();
        assert_eq!(err, EvalFailure::UnsupportedEngine(EngineKind::GraphQuery));
    }

    #[test]
    fn fan_out_writes_every_target() {
        let node = ComputationNode::new("n", "N", "7");
        let (g, mut state) = setup(node, |b| {
            b.writes("w1", "n", "out", "a").unwrap();
            b.writes("w2", "n", "e2", "b").unwrap();
        });
        let exec = ExecGraph::build(&g, &state).unwrap();
        let node = g.node("n").unwrap();
        let written = write_outputs(node, &Value::Int(7), &exec, &mut state).unwrap();
        assert_eq!(written, 2);
        assert_eq!(state.get("out", "a"), Some(&Value::Int(7)));
        assert_eq!(state.get("e2", "b"), Some(&Value::Int(7)));

        clear_outputs(node, &exec, &mut state).unwrap();
        assert_eq!(state.get("out", "a"), None);
        assert_eq!(state.get("e2", "x"), Some(&Value::Int(10)));
    }
}
