//! Core types for policy evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a list of criterion verdicts combines into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    /// AND logic - every entry must be met
    #[default]
    All,
    /// OR logic - at least one entry must be met
    Any,
}

impl LogicOperator {
    /// Whether a single verdict already decides the combined outcome.
    ///
    /// `Any` is decided by the first met entry, `All` by the first unmet one.
    pub fn is_decisive(self, met: bool) -> bool {
        match self {
            LogicOperator::Any => met,
            LogicOperator::All => !met,
        }
    }

    /// Outcome when every entry was evaluated without a decisive verdict.
    pub fn exhausted_outcome(self) -> bool {
        match self {
            LogicOperator::Any => false,
            LogicOperator::All => true,
        }
    }

    /// Combine a full list of verdicts.
    pub fn combine<I: IntoIterator<Item = bool>>(self, verdicts: I) -> bool {
        let mut verdicts = verdicts.into_iter();
        match self {
            LogicOperator::All => verdicts.all(|met| met),
            LogicOperator::Any => verdicts.any(|met| met),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicOperator::All => "all",
            LogicOperator::Any => "any",
        }
    }
}

impl std::fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single criterion extracted from a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    /// Unique identifier (e.g., "criterion_1")
    pub id: String,

    /// Short name
    pub name: String,

    /// Full text of the criterion
    pub description: String,

    /// Ordered sub-criteria. Only one level is evaluated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_criteria: Vec<Criterion>,

    /// How sub-criteria combine into this criterion's verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_logic: Option<LogicOperator>,
}

impl Criterion {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            sub_criteria: Vec::new(),
            sub_logic: None,
        }
    }

    /// Attach sub-criteria combined with `logic`.
    pub fn with_sub_criteria(mut self, logic: LogicOperator, subs: Vec<Criterion>) -> Self {
        self.sub_criteria = subs;
        self.sub_logic = Some(logic);
        self
    }

    /// Whether this criterion is decided by its sub-criteria.
    pub fn has_sub_criteria(&self) -> bool {
        !self.sub_criteria.is_empty()
    }

    /// Effective sub-criterion logic (ALL when unspecified).
    pub fn effective_sub_logic(&self) -> LogicOperator {
        self.sub_logic.unwrap_or_default()
    }
}

/// Context about the policy that every node may read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyContext {
    pub title: String,
    pub description: String,
}

impl PolicyContext {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Verdict for one sub-criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubCriterionResult {
    pub sub_criterion_id: String,
    pub sub_criterion_name: String,
    pub met: bool,
    pub reasoning: String,
    pub confidence: f64,
}

/// Verdict for one top-level criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionResult {
    pub criterion_id: String,
    pub criterion_name: String,
    pub met: bool,
    pub reasoning: String,
    pub confidence: f64,

    /// Sub-criteria actually evaluated, in declared order.
    ///
    /// When evaluation short-circuits this is a strict prefix of the
    /// declared list; consumers must not assume every sub-criterion has a
    /// result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_results: Vec<SubCriterionResult>,
}

/// Confidence tier derived from two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// At or above the high threshold
    High,
    /// Between thresholds
    Medium,
    /// Below the low threshold
    Low,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::High => f.write_str("high"),
            ConfidenceLevel::Medium => f.write_str("medium"),
            ConfidenceLevel::Low => f.write_str("low"),
        }
    }
}

/// Final result of evaluating one input against one policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    /// Whether the overall policy is satisfied
    pub policy_satisfied: bool,

    /// The text that was evaluated
    pub input_text: String,

    /// Title of the policy used
    pub policy_title: String,

    /// Per-criterion results in evaluation order
    pub criterion_results: Vec<CriterionResult>,

    /// Summary of the evaluation
    pub overall_reasoning: String,

    /// Overall confidence in [0, 1]
    pub overall_confidence: f64,

    /// Classified confidence tier
    pub confidence_level: ConfidenceLevel,

    /// Whether human review is recommended
    #[serde(default)]
    pub needs_review: bool,

    /// IDs of criteria whose confidence fell below the low threshold
    #[serde(default)]
    pub low_confidence_criteria: Vec<String>,

    /// When the report was produced
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Look up a criterion result by id.
    pub fn criterion(&self, id: &str) -> Option<&CriterionResult> {
        self.criterion_results.iter().find(|r| r.criterion_id == id)
    }
}
