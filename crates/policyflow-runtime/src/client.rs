//! The single path from a node to the reasoning service.
//!
//! Order for every call:
//! 1. Response cache lookup (a hit returns without touching the limiter)
//! 2. Rate limiter wait
//! 3. Provider call and verdict parsing, under the retry policy
//! 4. Cache store of the parsed verdict

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheKey, ResponseCache};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::RetryPolicy;
use crate::throttle::RateLimiter;

lazy_static! {
    /// Markdown code fence around a response body
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)```[A-Za-z]*\s*\n?(.*?)\s*```"
    ).unwrap();
}

/// Errors from a reasoning call after retries are exhausted.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed verdict: {0}")]
    MalformedResponse(String),
}

/// A parsed `{met, reasoning, confidence}` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub met: bool,

    #[serde(default)]
    pub reasoning: String,

    pub confidence: f64,
}

impl Verdict {
    /// Parse a provider response: JSON (optionally fenced), falling back to
    /// YAML. Confidence must be a finite value in [0, 1].
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        let body = CODE_FENCE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(text)
            .trim();

        let verdict: Verdict = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(json_err) => serde_yaml::from_str(body).map_err(|yaml_err| {
                ClientError::MalformedResponse(format!(
                    "not JSON ({}) or YAML ({})",
                    json_err, yaml_err
                ))
            })?,
        };

        if !verdict.confidence.is_finite() || !(0.0..=1.0).contains(&verdict.confidence) {
            return Err(ClientError::MalformedResponse(format!(
                "confidence {} outside [0, 1]",
                verdict.confidence
            )));
        }

        Ok(verdict)
    }
}

/// Call counters, shared by every node using the client.
#[derive(Debug, Default)]
pub struct ClientStats {
    provider_calls: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

impl ClientStats {
    /// Provider attempts, including retries.
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Calls that failed after every attempt.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Cache-, throttle- and retry-aware access to a provider.
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    stats: ClientStats,
}

impl LlmClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter,
            retry,
            stats: ClientStats::default(),
        }
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Ask the provider for a verdict. `label` names the call in logs.
    pub async fn evaluate(
        &self,
        label: &str,
        system_prompt: &str,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Verdict, ClientError> {
        let key = CacheKey::for_request(system_prompt, prompt);

        if let Some(verdict) = self.cache.get::<Verdict>(&key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(call = %label, key = %key, "Cache hit");
            return Ok(verdict);
        }

        self.limiter.wait_if_needed().await;

        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)];
        let provider = &self.provider;
        let stats = &self.stats;
        let messages = &messages;

        let result = self
            .retry
            .run(label, || async move {
                stats.provider_calls.fetch_add(1, Ordering::Relaxed);
                let response = provider.complete(messages.clone(), config).await?;
                Verdict::parse(&response.content)
            })
            .await;

        match result {
            Ok(verdict) => {
                self.cache.put(&key, &verdict);
                Ok(verdict)
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    call = %label,
                    provider = %self.provider.name(),
                    error = %e,
                    "Reasoning call failed after retries"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("cache", &self.cache)
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish()
    }
}
