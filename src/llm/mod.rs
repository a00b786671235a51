//! Provider seam for multi-provider fan-out.

pub mod provider;
pub mod types;

pub use provider::{LlmProvider, MockProvider};
pub use types::{LlmRequest, LlmResponse, ProviderError, ToolCall};
