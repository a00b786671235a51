use crate::llm::types::{LlmRequest, LlmResponse, ProviderError};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Generic LLM provider seam the parallel executor fans out over.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a single request against this provider
    async fn execute_request(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError>;

    /// Provider name/identifier, used to annotate aggregated results
    fn provider_name(&self) -> &str;
}

/// In-process provider with configurable content, delay, confidence, and
/// failure mode. Used by tests and as a stand-in during development.
pub struct MockProvider {
    name: String,
    content: Option<String>,
    delay: Duration,
    confidence: Option<f64>,
    fail: bool,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: None,
            delay: Duration::ZERO,
            confidence: None,
            fail: false,
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Make every request fail with [`ProviderError::RequestFailed`].
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn execute_request(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if self.fail {
            return Err(ProviderError::RequestFailed {
                provider: self.name.clone(),
                message: "mock provider configured to fail".to_string(),
            });
        }

        let content = match &self.content {
            Some(content) => content.clone(),
            None => format!("{}: {}", self.name, request.prompt),
        };
        let mut response = LlmResponse::new(request.id, &self.name, &content);
        response.latency = started.elapsed();
        if let Some(confidence) = self.confidence {
            response = response.with_metadata("confidence", serde_json::json!(confidence));
        }
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
