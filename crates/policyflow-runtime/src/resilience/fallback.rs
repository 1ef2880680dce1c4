//! What a node does when its reasoning call fails for good.

use serde::{Deserialize, Serialize};

/// Failure policy for LLM-backed nodes, set per node via `on_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Surface the error and halt the run
    #[default]
    Propagate,

    /// Record an unmet verdict with zero confidence and continue
    DefaultResult,
}

impl FailurePolicy {
    /// Reasoning recorded for a defaulted verdict.
    pub fn default_reasoning(error: &impl std::fmt::Display) -> String {
        format!("Evaluation failed, defaulted to not met: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_params() {
        let policy: FailurePolicy = serde_json::from_value(serde_json::json!("default_result")).unwrap();
        assert_eq!(policy, FailurePolicy::DefaultResult);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Propagate);
    }

    #[test]
    fn test_default_reasoning_names_error() {
        let reasoning = FailurePolicy::default_reasoning(&"timeout after 15s");
        assert!(reasoning.contains("timeout after 15s"));
    }
}
