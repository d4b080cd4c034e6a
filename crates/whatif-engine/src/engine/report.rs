//! Execution reports and the human-readable scenario report.

use std::fmt;

use serde::Serialize;

use whatif_core::{NodeId, Value};

use super::error::NodeError;
use super::scenario::ScenarioResult;
use super::trace::TraceEntry;

/// Outcome of one execution pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// The resolved order the pass followed.
    pub order: Vec<NodeId>,
    /// Nodes that were evaluated, successfully or not.
    pub evaluated: Vec<NodeId>,
    pub errors: Vec<NodeError>,
    /// True when a fail-fast pass stopped before the end of `order`.
    pub halted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEntry>,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

fn show(v: Option<&Value>) -> String {
    match v {
        Some(Value::Str(s)) => format!("{s:?}"),
        Some(other) => other.to_string(),
        None => "<absent>".to_string(),
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.title)?;

        writeln!(f, "Overrides:")?;
        if self.overrides.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (entity, props) in &self.overrides {
            for (prop, value) in props {
                writeln!(f, "  {entity}.{prop} = {}", show(Some(value)))?;
            }
        }

        let affected: Vec<_> = self.affected_entity_ids.iter().map(NodeId::as_str).collect();
        if affected.is_empty() {
            writeln!(f, "Affected entities: (none)")?;
        } else {
            writeln!(f, "Affected entities: {}", affected.join(", "))?;
        }

        writeln!(f, "Outputs:")?;
        if self.outputs_per_node.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (entity, props) in &self.outputs_per_node {
            for (prop, value) in props {
                writeln!(f, "  {entity}.{prop} = {}", show(Some(value)))?;
            }
        }

        writeln!(f, "Changes:")?;
        if self.diff.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for d in &self.diff {
            writeln!(
                f,
                "  {}.{}: {} -> {}",
                d.entity_id,
                d.property,
                show(d.baseline.as_ref()),
                show(d.scenario.as_ref())
            )?;
        }

        if self.success {
            write!(f, "Status: OK")
        } else {
            writeln!(f, "Status: FAILED ({} node error(s))", self.errors.len())?;
            for (i, e) in self.errors.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "  {}: {}", e.node, e.message())?;
            }
            Ok(())
        }
    }
}
