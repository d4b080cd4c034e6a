//! Expression errors.
//!
//! Parse-time and evaluation-time failures share one enum so a node's cached
//! parse result and its evaluation outcome can be reported the same way.

use serde::Serialize;

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("expression nesting exceeds depth limit ({limit})")]
    TooDeep { limit: usize },

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{function}() expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("type mismatch in {operation}: {found}")]
    TypeMismatch { operation: String, found: String },

    #[error("division by zero")]
    DivideByZero,

    #[error("integer overflow in {operation}")]
    IntegerOverflow { operation: String },

    #[error("evaluation step budget ({limit}) exceeded")]
    BudgetExceeded { limit: usize },

    #[error("invalid date '{input}'")]
    InvalidDate { input: String },

    #[error("invalid number '{input}'")]
    InvalidNumber { input: String },
}

impl ExprError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        ExprError::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(operation: impl Into<String>, found: impl Into<String>) -> Self {
        ExprError::TypeMismatch {
            operation: operation.into(),
            found: found.into(),
        }
    }

    pub(crate) fn overflow(operation: impl Into<String>) -> Self {
        ExprError::IntegerOverflow {
            operation: operation.into(),
        }
    }
}
