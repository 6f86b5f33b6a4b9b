//! Test Support
//!
//! A scripted LLM provider for exercising the workflow without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use service_builder_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
};

/// A mock LLM provider that returns predefined responses for testing.
pub(crate) struct MockLlmProvider {
    /// Responses returned in sequence; each call pops the first one.
    responses: Mutex<VecDeque<LlmResult<LlmResponse>>>,
    /// Returned for every call once the queue is empty, when set.
    repeating: Option<String>,
    /// Number of `send_message` calls observed.
    calls: AtomicUsize,
    config: ProviderConfig,
}

impl MockLlmProvider {
    pub(crate) fn with_responses(responses: Vec<LlmResult<LlmResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            repeating: None,
            calls: AtomicUsize::new(0),
            config: ProviderConfig::default(),
        }
    }

    /// A single text response.
    pub(crate) fn with_text(text: &str) -> Self {
        Self::with_responses(vec![Ok(LlmResponse::text(text, "mock-model"))])
    }

    /// A sequence of text responses, one per call.
    pub(crate) fn with_responses_text(texts: Vec<&str>) -> Self {
        Self::with_responses(
            texts
                .into_iter()
                .map(|t| Ok(LlmResponse::text(t, "mock-model")))
                .collect(),
        )
    }

    /// The same text response for every call.
    pub(crate) fn with_repeating_text(text: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeating: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            config: ProviderConfig::default(),
        }
    }

    /// Number of `send_message` calls observed so far.
    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn send_message(
        &self,
        _messages: Vec<Message>,
        _system: Option<String>,
        _options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let queued = self.responses.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => match &self.repeating {
                Some(text) => Ok(LlmResponse::text(text.clone(), "mock-model")),
                None => Err(LlmError::Other {
                    message: "No more mock responses available".to_string(),
                }),
            },
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
