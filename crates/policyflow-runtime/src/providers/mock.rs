//! Scriptable provider for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync>;

pub(crate) struct MockProvider {
    responder: Responder,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

/// Verdict text in the shape the client expects.
pub(crate) fn verdict(met: bool, confidence: f64) -> String {
    format!(
        r#"{{"met": {}, "reasoning": "scripted verdict", "confidence": {}}}"#,
        met, confidence
    )
}

impl MockProvider {
    pub(crate) fn new(
        responder: impl Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Same text for every call.
    pub(crate) fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Responses in order; errors once the script runs out.
    pub(crate) fn scripted(script: Vec<Result<String, ProviderError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(script));
        Self::new(move |_| {
            queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::HttpError("script exhausted".to_string())))
        })
    }

    /// Verdicts in order, one per call.
    pub(crate) fn verdicts(verdicts: &[(bool, f64)]) -> Self {
        Self::scripted(verdicts.iter().map(|&(m, c)| Ok(verdict(m, c))).collect())
    }

    /// Pick the response whose keyword appears in the system prompt.
    pub(crate) fn keyed(entries: Vec<(&'static str, String)>) -> Self {
        Self::new(move |messages| {
            let system = messages
                .iter()
                .find(|m| m.role == "system")
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            entries
                .iter()
                .find(|(keyword, _)| system.contains(keyword))
                .map(|(_, response)| Ok(response.clone()))
                .unwrap_or_else(|| Err(ProviderError::HttpError("no keyed response".to_string())))
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn system_prompts(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|msgs| msgs.iter().find(|m| m.role == "system"))
            .map(|m| m.content.clone())
            .collect()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.responder)(&messages);
        self.seen.lock().push(messages);
        result.map(CompletionResponse::text)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
