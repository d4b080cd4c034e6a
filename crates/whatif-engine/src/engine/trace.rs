//! Execution trace recording.
//!
//! When tracing is enabled via [`EngineConfig::trace_enabled`](super::EngineConfig),
//! the engine records a [`TraceEntry`] for every node evaluation, capturing the
//! node id, bound inputs, and the produced value or error message.

use serde::Serialize;

use whatif_core::{NodeId, Value};

use crate::expr::Bindings;

/// A single entry in the execution trace, recording one node evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub node_id: NodeId,
    pub name: String,
    /// Variables bound for this evaluation.
    pub inputs: Bindings,
    /// Value produced (None when the node failed).
    pub output: Option<Value>,
    pub error: Option<String>,
}
