use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Generic LLM request that any provider can serve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub id: Uuid,
    pub prompt: String,
    pub context: HashMap<String, String>,
    pub max_tokens: Option<u64>,
    pub model: Option<String>,
}

impl LlmRequest {
    pub fn new(prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            context: HashMap::new(),
            max_tokens: None,
            model: None,
        }
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}

/// A structured tool invocation extracted from a provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Generic LLM response from any provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub request_id: Uuid,
    pub provider: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub latency: Duration,
}

impl LlmResponse {
    pub fn new(request_id: Uuid, provider: &str, content: &str) -> Self {
        Self {
            request_id,
            provider: provider.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Confidence score advertised in response metadata; 0.5 when absent
    /// or not numeric.
    pub fn confidence(&self) -> f64 {
        self.metadata
            .get("confidence")
            .and_then(|value| value.as_f64())
            .unwrap_or(0.5)
    }
}

/// Errors surfaced by a provider dispatch
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("provider '{provider}' request failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
