//! Deterministic pattern matching over input text.
//!
//! A `PatternSet` holds compiled regexes (user-supplied or built-in) and
//! combines their matches with a `LogicOperator`. Built-in patterns are
//! referenced as `builtin:<name>`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::LogicOperator;

lazy_static! {
    /// Email address pattern (RFC 5322 simplified)
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    /// US phone number pattern (with optional country code)
    static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+?1[-.\s]?)?(?:\([0-9]{3}\)|[0-9]{3})[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}"
    ).unwrap();

    /// Social Security Number pattern (XXX-XX-XXXX)
    static ref SSN_PATTERN: Regex = Regex::new(
        r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b"
    ).unwrap();

    /// Credit card number pattern (16 digits with optional separators)
    static ref CREDIT_CARD_PATTERN: Regex = Regex::new(
        r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"
    ).unwrap();

    /// http(s) URL
    static ref URL_PATTERN: Regex = Regex::new(
        r#"https?://[^\s<>"']+"#
    ).unwrap();

    /// API key / secret / token assignment
    static ref API_KEY_PATTERN: Regex = Regex::new(
        r#"(?i)(api[_-]?key|secret[_-]?key|access[_-]?token|auth[_-]?token|bearer|password|secret|token)[\s:=]+['"]?[a-zA-Z0-9_-]{16,}['"]?"#
    ).unwrap();
}

/// Errors from pattern compilation.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown built-in pattern: {0}")]
    UnknownBuiltin(String),

    #[error("Pattern set is empty")]
    Empty,
}

/// Look up a built-in pattern by name.
fn builtin(name: &str) -> Option<&'static Regex> {
    match name {
        "email" => Some(&EMAIL_PATTERN),
        "phone" => Some(&PHONE_PATTERN),
        "ssn" => Some(&SSN_PATTERN),
        "credit_card" => Some(&CREDIT_CARD_PATTERN),
        "url" => Some(&URL_PATTERN),
        "api_key" => Some(&API_KEY_PATTERN),
        _ => None,
    }
}

/// Names of all built-in patterns.
pub const BUILTIN_PATTERNS: &[&str] = &["email", "phone", "ssn", "credit_card", "url", "api_key"];

/// One matched span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternHit {
    /// The pattern as written in the configuration
    pub pattern: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Outcome of matching a set against one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternOutcome {
    pub matched: bool,
    /// Patterns that matched at least once
    pub matched_patterns: Vec<String>,
    pub hits: Vec<PatternHit>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// A compiled, ordered set of patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
    logic: LogicOperator,
}

impl PatternSet {
    /// Compile patterns. Entries of the form `builtin:<name>` resolve to
    /// built-in patterns; everything else compiles as a regex.
    pub fn new<S: AsRef<str>>(
        patterns: &[S],
        logic: LogicOperator,
        case_insensitive: bool,
    ) -> Result<Self, PatternError> {
        if patterns.is_empty() {
            return Err(PatternError::Empty);
        }

        let compiled = patterns
            .iter()
            .map(|p| Self::compile(p.as_ref(), case_insensitive))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: compiled,
            logic,
        })
    }

    fn compile(source: &str, case_insensitive: bool) -> Result<CompiledPattern, PatternError> {
        if let Some(name) = source.strip_prefix("builtin:") {
            let regex = builtin(name).ok_or_else(|| PatternError::UnknownBuiltin(name.to_string()))?;
            return Ok(CompiledPattern {
                source: source.to_string(),
                regex: regex.clone(),
            });
        }

        let expr = if case_insensitive {
            format!("(?i){}", source)
        } else {
            source.to_string()
        };

        let regex = Regex::new(&expr).map_err(|e| PatternError::InvalidRegex {
            pattern: source.to_string(),
            source: e,
        })?;

        Ok(CompiledPattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Match every pattern against `text` and combine under the set's logic.
    pub fn evaluate(&self, text: &str) -> PatternOutcome {
        let mut hits = Vec::new();
        let mut matched_patterns = Vec::new();

        for pattern in &self.patterns {
            let before = hits.len();
            hits.extend(pattern.regex.find_iter(text).map(|m| PatternHit {
                pattern: pattern.source.clone(),
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            }));
            if hits.len() > before {
                matched_patterns.push(pattern.source.clone());
            }
        }

        let matched = self.logic.combine(
            self.patterns
                .iter()
                .map(|p| matched_patterns.contains(&p.source)),
        );

        PatternOutcome {
            matched,
            matched_patterns,
            hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_email_detection() {
        let set = PatternSet::new(&["builtin:email"], LogicOperator::Any, false).unwrap();
        let outcome = set.evaluate("Contact john@example.com for help");
        assert!(outcome.matched);
        assert_eq!(outcome.hits[0].text, "john@example.com");
        assert_eq!(outcome.hits[0].start, 8);
    }

    #[test]
    fn test_builtin_phone_and_ssn() {
        let set = PatternSet::new(&["builtin:phone"], LogicOperator::Any, false).unwrap();
        assert!(set.evaluate("Call us at 555-123-4567").matched);

        let set = PatternSet::new(&["builtin:ssn"], LogicOperator::Any, false).unwrap();
        assert!(set.evaluate("SSN: 123-45-6789").matched);
        assert!(!set.evaluate("Not an SSN: 12-345-6789").matched);
    }

    #[test]
    fn test_any_vs_all() {
        let patterns = ["buy", "sell"];
        let any = PatternSet::new(&patterns, LogicOperator::Any, false).unwrap();
        let all = PatternSet::new(&patterns, LogicOperator::All, false).unwrap();

        let text = "You should buy this fund";
        assert!(any.evaluate(text).matched);
        assert!(!all.evaluate(text).matched);
        assert!(all.evaluate("buy low, sell high").matched);
    }

    #[test]
    fn test_case_insensitive() {
        let set = PatternSet::new(&["guaranteed returns"], LogicOperator::Any, true).unwrap();
        assert!(set.evaluate("GUARANTEED RETURNS for all").matched);

        let strict = PatternSet::new(&["guaranteed returns"], LogicOperator::Any, false).unwrap();
        assert!(!strict.evaluate("GUARANTEED RETURNS for all").matched);
    }

    #[test]
    fn test_matched_patterns_listed_once() {
        let set = PatternSet::new(&["a", "z"], LogicOperator::Any, false).unwrap();
        let outcome = set.evaluate("banana");
        assert_eq!(outcome.matched_patterns, vec!["a".to_string()]);
        assert_eq!(outcome.hits.len(), 3);
    }

    #[test]
    fn test_invalid_regex() {
        let err = PatternSet::new(&["(unclosed"], LogicOperator::Any, false).unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { .. }));
    }

    #[test]
    fn test_unknown_builtin_and_empty() {
        assert!(matches!(
            PatternSet::new(&["builtin:passport"], LogicOperator::Any, false),
            Err(PatternError::UnknownBuiltin(_))
        ));
        let none: [&str; 0] = [];
        assert!(matches!(
            PatternSet::new(&none, LogicOperator::Any, false),
            Err(PatternError::Empty)
        ));
    }

    #[test]
    fn test_every_builtin_resolves() {
        for name in BUILTIN_PATTERNS {
            assert!(builtin(name).is_some(), "missing builtin {}", name);
        }
    }
}
