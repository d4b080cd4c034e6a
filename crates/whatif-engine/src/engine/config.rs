//! Engine configuration.
//!
//! Reads optional overrides from environment variables in
//! [`EngineConfig::from_env`]:
//! - `WHATIF_TRACE`: record a trace entry per evaluated node (default: off)
//! - `WHATIF_MAX_EVAL_STEPS`: per-node evaluation step budget (default: 10000)
//! - `WHATIF_MAX_EXPR_DEPTH`: expression nesting limit (default: 64)
//! - `WHATIF_FAIL_FAST`: stop a pass at the first node error (default: off)

use serde::{Deserialize, Serialize};

/// What a pass does after a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the error and keep evaluating the remaining nodes.
    #[default]
    BestEffort,
    /// Stop the pass at the first node error.
    FailFast,
}

/// Configuration for an [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether to record a [`TraceEntry`](super::TraceEntry) per evaluated node.
    pub trace_enabled: bool,
    /// Maximum AST nodes visited per node evaluation. Default: 10000.
    pub max_eval_steps: usize,
    /// Maximum expression nesting depth accepted by the parser. Each chained
    /// operator counts one level. Default: 64.
    pub max_expr_depth: usize,
    pub failure_policy: FailurePolicy,
    /// Remove a failed node's output properties instead of keeping the stale
    /// values, so downstream readers observe `Null`.
    pub clear_outputs_on_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trace_enabled: false,
            max_eval_steps: 10_000,
            max_expr_depth: 64,
            failure_policy: FailurePolicy::BestEffort,
            clear_outputs_on_error: false,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `WHATIF_*` environment variables that are set
    /// and parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EngineConfig::default();
        if let Some(v) = lookup("WHATIF_TRACE") {
            config.trace_enabled = parse_flag(&v);
        }
        if let Some(n) = lookup("WHATIF_MAX_EVAL_STEPS").and_then(|v| v.trim().parse().ok()) {
            config.max_eval_steps = n;
        }
        if let Some(n) = lookup("WHATIF_MAX_EXPR_DEPTH").and_then(|v| v.trim().parse().ok()) {
            config.max_expr_depth = n;
        }
        if let Some(v) = lookup("WHATIF_FAIL_FAST") {
            if parse_flag(&v) {
                config.failure_policy = FailurePolicy::FailFast;
            }
        }
        config
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
