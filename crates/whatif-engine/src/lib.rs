//! Execution engine for whatif computation graphs.
//!
//! - [`expr`] is the closed expression language computation nodes are written
//!   in: lexer, parser, AST, evaluator and the allow-listed functions.
//! - [`engine`] merges a [`whatif_core::ComputationGraph`] with an
//!   [`whatif_core::ExecutionState`], resolves a dependency order, evaluates
//!   every node, and runs isolated what-if scenarios on top.

pub mod engine;
pub mod expr;

pub use engine::{
    DiffEntry, Engine, EngineConfig, EngineError, EvalFailure, ExecutionReport, FailurePolicy,
    NodeError, Override, ScenarioResult, Snapshot, TraceEntry,
};
pub use expr::{Expr, ExprError};
