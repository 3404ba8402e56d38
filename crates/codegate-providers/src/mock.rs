//! Scriptable provider for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use codegate_core::error::ProviderError;
use codegate_core::traits::{
    GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage,
};

/// Assessment returned when nothing else is configured.
pub const DEFAULT_ASSESSMENT: &str = r#"{
  "total_score": 45,
  "rubric": {
    "functional_correctness": 8,
    "code_readability": 8,
    "structure_modularity": 7,
    "performance_efficiency": 7,
    "security_practices": 8,
    "error_handling": 7
  },
  "status": "APPROVED",
  "feedback_summary": "Mock review: the submission meets the stated requirements.",
  "line_comments": [],
  "diff_suggestions": []
}"#;

/// How the mock answers.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with text, choosing by prompt substring first.
    Respond,
    /// Fail every call with a network error.
    Fail(String),
}

/// A mock LLM provider that never leaves the process.
///
/// Responses are matched by prompt substring; unmatched prompts get the
/// default response. An optional delay is applied before answering so
/// timeout handling can be exercised.
pub struct MockProvider {
    /// Map of prompt substring → response text.
    responses: HashMap<String, String>,
    default_response: String,
    behavior: MockBehavior,
    delay: Duration,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Create a mock with the given prompt→response mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: DEFAULT_ASSESSMENT.to_string(),
            behavior: MockBehavior::Respond,
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        let mut mock = Self::new(HashMap::new());
        mock.default_response = response.to_string();
        mock
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        let mut mock = Self::new(HashMap::new());
        mock.behavior = MockBehavior::Fail(message.to_string());
        mock
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request received, if any.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let MockBehavior::Fail(message) = &self.behavior {
            return Err(ProviderError::NetworkError(message.clone()).into());
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: self.delay.as_millis() as u64,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
        }]
    }
}
