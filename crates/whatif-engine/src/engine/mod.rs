//! The what-if execution engine.
//!
//! # Architecture
//!
//! - [`Engine`] owns one [`ExecutionState`] and shares an immutable
//!   [`ComputationGraph`] through an `Arc`.
//! - [`exec_graph::ExecGraph`] merges the model with the state's entities
//!   into a petgraph multigraph and rejects references to unknown entities.
//! - [`resolve`] computes a total order over computation nodes, including
//!   writer-before-reader dependencies that are not explicit edges, and
//!   rejects cycles.
//! - [`evaluate`] evaluates one node against its bound inputs and fans the
//!   result out to every WRITES target.
//! - [`Snapshot`] and [`Engine::run_scenario`] give isolated what-if runs.
//!
//! Every mutating operation takes `&mut Engine`; share an engine across
//! threads behind a `Mutex`.
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = Engine::new(graph, state)?;
//! let report = engine.execute()?;
//! let result = engine.run_scenario([("order_001", "price", 150)], "price rise")?;
//! println!("{result}");
//! ```

pub mod config;
pub mod error;
pub mod evaluate;
pub mod exec_graph;
pub mod report;
pub mod resolve;
pub mod scenario;
pub mod snapshot;
pub mod trace;

use std::collections::HashMap;
use std::sync::Arc;

use whatif_core::{ComputationGraph, ExecutionState, NodeId, PropertyBag, StateDump, Value};

pub use config::{EngineConfig, FailurePolicy};
pub use error::{EngineError, EvalFailure, NodeError};
pub use report::ExecutionReport;
pub use scenario::{DiffEntry, Override, PropertyMap, ScenarioResult};
pub use snapshot::Snapshot;
pub use trace::TraceEntry;

use evaluate::CompiledExprs;
use exec_graph::ExecGraph;

/// Executes a computation graph over an owned execution state.
#[derive(Debug)]
pub struct Engine {
    graph: Arc<ComputationGraph>,
    exec: ExecGraph,
    state: ExecutionState,
    config: EngineConfig,
    compiled: CompiledExprs,
    /// Resolved once; the graph never changes under an engine.
    order: Result<Vec<NodeId>, EngineError>,
    last_errors: Vec<NodeError>,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new(
        graph: impl Into<Arc<ComputationGraph>>,
        state: ExecutionState,
    ) -> Result<Self, EngineError> {
        Self::with_config(graph, state, EngineConfig::default())
    }

    /// Creates an engine.
    ///
    /// Fails if the graph references an entity `state` does not contain, or
    /// holds a relationship whose endpoints do not fit its kind. A dependency
    /// cycle does not fail construction; it fails [`Engine::execute`].
    pub fn with_config(
        graph: impl Into<Arc<ComputationGraph>>,
        state: ExecutionState,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let graph = graph.into();
        let exec = ExecGraph::build(&graph, &state)?;
        let order = resolve::resolve_order(&exec);
        let compiled = evaluate::compile_all(&graph, config.max_expr_depth);
        for (id, result) in &compiled {
            if let Err(err) = result {
                tracing::warn!(node = %id, error = %err, "expression failed to parse");
            }
        }
        Ok(Engine {
            graph,
            exec,
            state,
            config,
            compiled,
            order,
            last_errors: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Runs every computation node once, in dependency order.
    ///
    /// Returns `Err(CycleDetected)` without evaluating anything when no order
    /// exists. Otherwise returns a report whose `errors` lists every node that
    /// failed; a failed node's outputs are left unwritten for this pass.
    pub fn execute(&mut self) -> Result<ExecutionReport, EngineError> {
        let order = self.execution_order()?.to_vec();
        let mut results: HashMap<NodeId, Value> = HashMap::new();
        let mut evaluated = Vec::with_capacity(order.len());
        let mut errors = Vec::new();
        let mut trace = Vec::new();
        let mut halted = false;

        for id in &order {
            let Some(node) = self.graph.node_arc(id.as_str()) else {
                continue;
            };
            let bindings = evaluate::bind_inputs(&node, &self.exec, &self.state, &results);
            let outcome = evaluate::evaluate_node(
                &node,
                &self.compiled,
                &bindings,
                self.config.max_eval_steps,
            );
            evaluated.push(id.clone());

            if self.config.trace_enabled {
                trace.push(TraceEntry {
                    node_id: id.clone(),
                    name: node.name.clone(),
                    inputs: bindings,
                    output: outcome.as_ref().ok().cloned(),
                    error: outcome.as_ref().err().map(ToString::to_string),
                });
            }

            match outcome {
                Ok(value) => {
                    let written =
                        evaluate::write_outputs(&node, &value, &self.exec, &mut self.state)?;
                    tracing::debug!(node = %id, value = %value, written, "evaluated node");
                    results.insert(id.clone(), value);
                }
                Err(failure) => {
                    tracing::warn!(node = %id, kind = failure.kind(), error = %failure, "node failed");
                    if self.config.clear_outputs_on_error {
                        evaluate::clear_outputs(&node, &self.exec, &mut self.state)?;
                    }
                    errors.push(NodeError {
                        node: id.clone(),
                        failure,
                    });
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        halted = true;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            evaluated = evaluated.len(),
            errors = errors.len(),
            halted,
            "execution pass finished"
        );
        self.last_errors = errors.clone();
        Ok(ExecutionReport {
            order,
            evaluated,
            errors,
            halted,
            trace,
        })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The resolved execution order, or the cycle that prevents one.
    pub fn execution_order(&self) -> Result<&[NodeId], EngineError> {
        match &self.order {
            Ok(order) => Ok(order),
            Err(err) => Err(err.clone()),
        }
    }

    /// Node errors recorded by the most recent pass.
    pub fn last_errors(&self) -> &[NodeError] {
        &self.last_errors
    }

    /// Current property bag of one entity.
    pub fn node_data(&self, id: &str) -> Option<&PropertyBag> {
        self.state.entity(id)
    }

    /// Deep copy of every entity's property bag.
    pub fn all_data_nodes(&self) -> StateDump {
        self.state.dump()
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn graph(&self) -> &Arc<ComputationGraph> {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sets one property directly, without evaluating anything.
    ///
    /// Fails with [`EngineError::UnknownEntity`] for an entity the state does
    /// not contain.
    pub fn set_property(
        &mut self,
        entity: &str,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, EngineError> {
        Ok(self.state.set(entity, property, value)?)
    }

    /// Consumes the engine, returning its state.
    pub fn into_state(self) -> ExecutionState {
        self.state
    }
}
