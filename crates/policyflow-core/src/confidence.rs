//! Confidence classification.
//!
//! A confidence score maps to one of three tiers using two thresholds:
//! - `confidence >= high` → HIGH
//! - `confidence < low` → LOW
//! - otherwise → MEDIUM
//!
//! `high >= low` is a standing invariant, checked on construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ConfidenceLevel;

/// Errors from gate construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("Threshold {name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("High threshold ({high}) must be >= low threshold ({low})")]
    Inverted { high: f64, low: f64 },
}

/// Two-threshold confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceGate {
    /// Confidence at or above this is high
    #[serde(default = "default_high")]
    pub high: f64,

    /// Confidence below this needs review
    #[serde(default = "default_low")]
    pub low: f64,
}

fn default_high() -> f64 {
    0.8
}

fn default_low() -> f64 {
    0.5
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            high: default_high(),
            low: default_low(),
        }
    }
}

impl ConfidenceGate {
    /// Create a gate, validating both thresholds.
    pub fn new(high: f64, low: f64) -> Result<Self, GateError> {
        let gate = Self { high, low };
        gate.validate()?;
        Ok(gate)
    }

    /// Check range and ordering of the thresholds.
    pub fn validate(&self) -> Result<(), GateError> {
        for (name, value) in [("high", self.high), ("low", self.low)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GateError::OutOfRange { name, value });
            }
        }
        if self.high < self.low {
            return Err(GateError::Inverted {
                high: self.high,
                low: self.low,
            });
        }
        Ok(())
    }

    /// Classify a confidence score.
    pub fn classify(&self, confidence: f64) -> ConfidenceLevel {
        if confidence >= self.high {
            ConfidenceLevel::High
        } else if confidence < self.low {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Medium
        }
    }

    /// Whether a score falls below the low threshold.
    pub fn is_low(&self, confidence: f64) -> bool {
        confidence < self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries_classify_inclusively() {
        let gate = ConfidenceGate::new(0.8, 0.5).unwrap();
        assert_eq!(gate.classify(0.5), ConfidenceLevel::Medium);
        assert_eq!(gate.classify(0.8), ConfidenceLevel::High);
        assert_eq!(gate.classify(0.49), ConfidenceLevel::Low);
        assert_eq!(gate.classify(1.0), ConfidenceLevel::High);
        assert_eq!(gate.classify(0.0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let err = ConfidenceGate::new(0.4, 0.6).unwrap_err();
        assert!(matches!(err, GateError::Inverted { .. }));
    }

    #[test]
    fn test_equal_thresholds_allowed() {
        let gate = ConfidenceGate::new(0.7, 0.7).unwrap();
        assert_eq!(gate.classify(0.7), ConfidenceLevel::High);
        assert_eq!(gate.classify(0.69), ConfidenceLevel::Low);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            ConfidenceGate::new(1.2, 0.5),
            Err(GateError::OutOfRange { name: "high", .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_classification_is_monotonic(
            low in 0.0f64..=1.0,
            spread in 0.0f64..=1.0,
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let high = (low + spread).min(1.0);
            let gate = ConfidenceGate::new(high, low).unwrap();
            let rank = |level: ConfidenceLevel| match level {
                ConfidenceLevel::Low => 0,
                ConfidenceLevel::Medium => 1,
                ConfidenceLevel::High => 2,
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(gate.classify(lo)) <= rank(gate.classify(hi)));
        }
    }
}
