use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::parallel::aggregator::ResultAggregator;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Parallel fan-out configuration
#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct ParallelConfig {
    /// Per-provider dispatch timeout in milliseconds. Always applied; the
    /// executor assumes network collaborators.
    pub call_timeout_ms: u64,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
        }
    }
}

/// Dispatches one request to every provider concurrently and aggregates
/// the settled responses. A provider that errors or times out contributes a
/// synthesized error response; the batch itself never fails.
pub struct ParallelExecutor {
    providers: Vec<Arc<dyn LlmProvider>>,
    aggregator: ResultAggregator,
    config: ParallelConfig,
}

impl ParallelExecutor {
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        aggregator: ResultAggregator,
        config: ParallelConfig,
    ) -> Self {
        Self {
            providers,
            aggregator,
            config,
        }
    }

    /// Fan the request out, wait for every dispatch to settle, and return
    /// the aggregated result.
    pub async fn execute_parallel(&self, request: LlmRequest) -> LlmResponse {
        info!(
            request = %request.id,
            providers = self.providers.len(),
            "dispatching request to all providers"
        );
        let per_call = Duration::from_millis(self.config.call_timeout_ms);

        let dispatches = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let request = request.clone();
            async move {
                let name = provider.provider_name().to_string();
                match timeout(per_call, provider.execute_request(request.clone())).await {
                    Ok(Ok(response)) => response,
                    Ok(Err(err)) => {
                        warn!(provider = %name, error = %err, "provider dispatch failed");
                        failure_response(request.id, &name, &err.to_string())
                    }
                    Err(_) => {
                        warn!(
                            provider = %name,
                            timeout_ms = self.config.call_timeout_ms,
                            "provider dispatch timed out"
                        );
                        failure_response(request.id, &name, "dispatch timed out")
                    }
                }
            }
        });

        let responses = join_all(dispatches).await;
        self.aggregator.aggregate(responses)
    }
}

/// Uniform-shaped stand-in for a failed dispatch so individual failures stay
/// visible in metadata instead of aborting the batch.
fn failure_response(request_id: Uuid, provider: &str, message: &str) -> LlmResponse {
    LlmResponse::new(request_id, provider, "")
        .with_metadata("synthetic", serde_json::json!(true))
        .with_metadata("failed_provider", serde_json::json!(provider))
        .with_metadata("error", serde_json::json!(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockProvider;
    use crate::parallel::aggregator::AggregationStrategy;

    fn executor(
        providers: Vec<Arc<dyn LlmProvider>>,
        strategy: AggregationStrategy,
        timeout_ms: u64,
    ) -> ParallelExecutor {
        ParallelExecutor::new(
            providers,
            ResultAggregator::new(strategy),
            ParallelConfig {
                call_timeout_ms: timeout_ms,
            },
        )
    }

    #[tokio::test]
    async fn merges_responses_from_all_providers() {
        let providers: Vec<Arc<dyn LlmProvider>> = vec![
            Arc::new(MockProvider::new("a").with_content("alpha")),
            Arc::new(MockProvider::new("b").with_content("beta")),
        ];
        let executor = executor(providers, AggregationStrategy::Merge, 1_000);
        let result = executor.execute_parallel(LlmRequest::new("go")).await;
        assert!(result.content.contains("alpha"));
        assert!(result.content.contains("beta"));
    }

    #[tokio::test]
    async fn a_failing_provider_does_not_abort_the_batch() {
        let providers: Vec<Arc<dyn LlmProvider>> = vec![
            Arc::new(MockProvider::new("bad").failing()),
            Arc::new(MockProvider::new("good").with_content("fine")),
        ];
        let executor = executor(providers, AggregationStrategy::Merge, 1_000);
        let result = executor.execute_parallel(LlmRequest::new("go")).await;
        assert!(result.content.contains("fine"));
        assert_eq!(result.metadata["failed_provider"], serde_json::json!("bad"));
    }

    #[tokio::test]
    async fn a_slow_provider_times_out_into_a_synthetic_response() {
        let providers: Vec<Arc<dyn LlmProvider>> = vec![Arc::new(
            MockProvider::new("slow").with_delay(Duration::from_millis(200)),
        )];
        let executor = executor(providers, AggregationStrategy::First, 10);
        let result = executor.execute_parallel(LlmRequest::new("go")).await;
        assert_eq!(result.metadata["synthetic"], serde_json::json!(true));
        assert_eq!(result.metadata["error"], serde_json::json!("dispatch timed out"));
    }

    #[tokio::test]
    async fn confidence_strategy_picks_the_strongest_provider() {
        let providers: Vec<Arc<dyn LlmProvider>> = vec![
            Arc::new(MockProvider::new("meek").with_confidence(0.3)),
            Arc::new(MockProvider::new("bold").with_confidence(0.95)),
        ];
        let executor = executor(providers, AggregationStrategy::Confidence, 1_000);
        let result = executor.execute_parallel(LlmRequest::new("go")).await;
        assert_eq!(result.provider, "bold");
    }
}
