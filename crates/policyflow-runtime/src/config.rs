//! Runtime configuration.
//!
//! `WorkflowConfig` is read from YAML. Durations are written in
//! human-readable form (`"2s"`, `"1h"`). Every load path runs `validate()`,
//! so a config that parsed is a config whose invariants hold.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use policyflow_core::{ConfidenceGate, GateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::CompletionConfig;
use crate::resilience::RetryPolicy;

/// Errors from configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid confidence gate: {0}")]
    Gate(#[from] GateError),

    #[error("Invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entry lifetime; zero disables caching
    #[serde(with = "duration_human")]
    pub ttl: Duration,

    /// Directory holding one YAML file per entry
    pub dir: PathBuf,

    /// Entries kept in the in-memory tier
    pub memory_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            dir: PathBuf::from(".cache"),
            memory_capacity: 1_000,
        }
    }
}

impl CacheConfig {
    /// TTL the cache should run with. Disabled caches use zero.
    pub fn effective_ttl(&self) -> Duration {
        if self.enabled {
            self.ttl
        } else {
            Duration::ZERO
        }
    }
}

/// Outbound request throttling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThrottleConfig {
    pub enabled: bool,

    /// Requests per minute
    pub rpm: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpm: 60,
        }
    }
}

impl ThrottleConfig {
    /// Capacity for the rate limiter; `None` means unlimited.
    pub fn capacity(&self) -> Option<u32> {
        self.enabled.then_some(self.rpm)
    }
}

/// Model selection with per-node-type overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub default_model: String,

    /// Node type tag -> model
    pub node_models: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: "claude-sonnet-4-20250514".to_string(),
            node_models: BTreeMap::new(),
        }
    }
}

impl ModelConfig {
    /// Model for a node type, falling back to the default model.
    pub fn model_for(&self, node_type: &str) -> &str {
        self.node_models
            .get(node_type)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }
}

/// Configuration for workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub temperature: f32,
    pub max_tokens: u32,

    /// Total attempts per LLM call, including the first
    pub max_retries: u32,

    /// Pause between attempts
    #[serde(with = "duration_human")]
    pub retry_wait: Duration,

    /// Upper bound on node executions per run
    pub max_steps: usize,

    pub confidence_gate: ConfidenceGate,
    pub cache: CacheConfig,
    pub throttle: ThrottleConfig,
    pub models: ModelConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            retry_wait: Duration::from_secs(2),
            max_steps: 1000,
            confidence_gate: ConfidenceGate::default(),
            cache: CacheConfig::default(),
            throttle: ThrottleConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Parse and validate a YAML config.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check every cross-field invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.confidence_gate.validate()?;

        if self.max_retries == 0 {
            return Err(ConfigError::invalid("max_retries", "must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::invalid("max_steps", "must be at least 1"));
        }
        if self.throttle.rpm == 0 {
            return Err(ConfigError::invalid("throttle.rpm", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("must be within [0, 2], got {}", self.temperature),
            ));
        }
        if self.models.default_model.trim().is_empty() {
            return Err(ConfigError::invalid("models.default_model", "must not be empty"));
        }

        Ok(())
    }

    /// Completion settings for a node of the given type.
    pub fn completion_config(&self, node_type: &str) -> CompletionConfig {
        CompletionConfig {
            model: self.models.model_for(node_type).to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_wait)
    }
}
