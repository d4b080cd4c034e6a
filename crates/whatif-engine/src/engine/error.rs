//! Engine error types.
//!
//! [`EngineError`] covers structural failures that stop an operation before
//! any node runs. [`NodeError`] records a single node's failure inside an
//! otherwise completed pass.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use whatif_core::{CoreError, EngineKind, NodeId, RelationshipId};

use crate::expr::ExprError;

/// Structural errors from building, resolving or simulating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The graph or an override references an entity the state does not hold.
    #[error("unknown entity '{id}'")]
    UnknownEntity { id: NodeId },

    /// A READS into, or WRITES out of, something that is not a computation node.
    #[error("invalid relationship '{id}': {reason}")]
    InvalidRelationship { id: RelationshipId, reason: String },

    /// No execution order exists.
    #[error("dependency cycle among computation nodes: {}", join_ids(.nodes))]
    CycleDetected { nodes: Vec<NodeId> },

    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EntityNotFound { id } => EngineError::UnknownEntity { id },
            CoreError::InvalidRelationship { id, reason } => {
                EngineError::InvalidRelationship { id, reason }
            }
            other => EngineError::Core(other),
        }
    }
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single node could not produce a value.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum EvalFailure {
    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("engine {0:?} is declared but not executable")]
    UnsupportedEngine(EngineKind),
}

impl EvalFailure {
    /// Stable short name for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalFailure::Expression(e) => match e {
                ExprError::Parse { .. } | ExprError::TooDeep { .. } => "parse",
                ExprError::UnknownVariable { .. } => "unknown_variable",
                ExprError::UnknownFunction { .. } => "unknown_function",
                ExprError::Arity { .. } => "arity",
                ExprError::TypeMismatch { .. } => "type_mismatch",
                ExprError::DivideByZero => "divide_by_zero",
                ExprError::IntegerOverflow { .. } => "overflow",
                ExprError::BudgetExceeded { .. } => "budget_exceeded",
                ExprError::InvalidDate { .. } | ExprError::InvalidNumber { .. } => "conversion",
            },
            EvalFailure::UnsupportedEngine(_) => "unsupported_engine",
        }
    }
}

/// A failure of one computation node during a pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("node '{node}' failed: {failure}")]
pub struct NodeError {
    pub node: NodeId,
    pub failure: EvalFailure,
}

impl NodeError {
    pub fn message(&self) -> String {
        self.failure.to_string()
    }
}

// Flattened for JSON reports: {"node", "kind", "message"}.
impl Serialize for NodeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NodeError", 3)?;
        s.serialize_field("node", &self.node)?;
        s.serialize_field("kind", self.failure.kind())?;
        s.serialize_field("message", &self.message())?;
        s.end()
    }
}
