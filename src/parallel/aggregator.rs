use crate::llm::LlmResponse;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Separator between payloads when merging textual content.
const MERGE_SEPARATOR: &str = "\n\n---\n\n";

/// Policy for collapsing N concurrently obtained responses into one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Keep the first response in dispatch order.
    #[default]
    First,
    /// Keep one response chosen uniformly at random.
    Random,
    /// Keep the response with the shortest content.
    Shortest,
    /// Keep the response with the longest content.
    Longest,
    /// Keep the response with the highest advertised confidence;
    /// ties keep the earliest.
    Confidence,
    /// Combine every response into one.
    Merge,
}

/// Collapses fan-out responses under a selectable strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultAggregator {
    strategy: AggregationStrategy,
}

impl ResultAggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Collapse a batch of responses into one. An empty batch yields a
    /// synthesized response rather than an error.
    pub fn aggregate(&self, mut responses: Vec<LlmResponse>) -> LlmResponse {
        if responses.is_empty() {
            return empty_result();
        }
        debug!(strategy = ?self.strategy, responses = responses.len(), "aggregating responses");

        match self.strategy {
            AggregationStrategy::First => responses.remove(0),
            AggregationStrategy::Random => {
                let index = rand::rng().random_range(0..responses.len());
                responses.swap_remove(index)
            }
            AggregationStrategy::Shortest => {
                let index = pick_index(&responses, |best, candidate| {
                    candidate.content.len() < best.content.len()
                });
                responses.swap_remove(index)
            }
            AggregationStrategy::Longest => {
                let index = pick_index(&responses, |best, candidate| {
                    candidate.content.len() > best.content.len()
                });
                responses.swap_remove(index)
            }
            AggregationStrategy::Confidence => {
                let index = pick_index(&responses, |best, candidate| {
                    candidate.confidence() > best.confidence()
                });
                responses.swap_remove(index)
            }
            AggregationStrategy::Merge => merge(responses),
        }
    }
}

/// Index of the element that wins every strict pairwise comparison;
/// the earliest element wins ties.
fn pick_index(
    responses: &[LlmResponse],
    beats: impl Fn(&LlmResponse, &LlmResponse) -> bool,
) -> usize {
    let mut best = 0;
    for index in 1..responses.len() {
        if beats(&responses[best], &responses[index]) {
            best = index;
        }
    }
    best
}

fn merge(responses: Vec<LlmResponse>) -> LlmResponse {
    let request_id = responses[0].request_id;
    let count = responses.len();

    let mut contents = Vec::with_capacity(count);
    let mut providers = Vec::with_capacity(count);
    let mut metadata = HashMap::new();
    let mut tool_calls = Vec::new();
    let mut latency = std::time::Duration::ZERO;

    for response in responses {
        contents.push(response.content);
        providers.push(response.provider);
        // Later responses overwrite earlier ones on key collision.
        metadata.extend(response.metadata);
        tool_calls.extend(response.tool_calls);
        latency = latency.max(response.latency);
    }

    let mut merged = LlmResponse::new(request_id, &providers.join("+"), &contents.join(MERGE_SEPARATOR));
    merged.metadata = metadata;
    merged.tool_calls = tool_calls;
    merged.latency = latency;
    merged
        .with_metadata("merged_count", serde_json::json!(count))
}

fn empty_result() -> LlmResponse {
    LlmResponse::new(Uuid::nil(), "aggregator", "")
        .with_metadata("synthetic", serde_json::json!(true))
        .with_metadata("error", serde_json::json!("no responses received"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    fn response(provider: &str, content: &str) -> LlmResponse {
        LlmResponse::new(Uuid::nil(), provider, content)
    }

    #[test]
    fn first_keeps_dispatch_order() {
        let aggregator = ResultAggregator::new(AggregationStrategy::First);
        let result = aggregator.aggregate(vec![response("a", "one"), response("b", "two")]);
        assert_eq!(result.provider, "a");
    }

    #[test]
    fn shortest_and_longest_pick_by_content_length() {
        let batch = vec![
            response("a", "medium!"),
            response("b", "ok"),
            response("c", "the longest of them all"),
        ];
        let shortest = ResultAggregator::new(AggregationStrategy::Shortest).aggregate(batch.clone());
        assert_eq!(shortest.provider, "b");
        let longest = ResultAggregator::new(AggregationStrategy::Longest).aggregate(batch);
        assert_eq!(longest.provider, "c");
    }

    #[test]
    fn confidence_prefers_highest_and_earliest_on_ties() {
        let batch = vec![
            response("a", "x").with_metadata("confidence", serde_json::json!(0.9)),
            response("b", "y").with_metadata("confidence", serde_json::json!(0.9)),
            response("c", "z"),
        ];
        let result = ResultAggregator::new(AggregationStrategy::Confidence).aggregate(batch);
        assert_eq!(result.provider, "a");
    }

    #[test]
    fn confidence_defaults_beat_lower_scores() {
        let batch = vec![
            response("a", "x").with_metadata("confidence", serde_json::json!(0.2)),
            response("b", "y"),
        ];
        let result = ResultAggregator::new(AggregationStrategy::Confidence).aggregate(batch);
        assert_eq!(result.provider, "b");
    }

    #[test]
    fn merge_combines_content_metadata_and_tool_calls() {
        let batch = vec![
            response("a", "alpha")
                .with_metadata("shared", serde_json::json!("from-a"))
                .with_tool_call(ToolCall {
                    name: "read".to_string(),
                    arguments: serde_json::json!({}),
                }),
            response("b", "beta").with_metadata("shared", serde_json::json!("from-b")),
            response("c", "gamma"),
        ];
        let result = ResultAggregator::new(AggregationStrategy::Merge).aggregate(batch);
        assert!(result.content.contains("alpha"));
        assert!(result.content.contains("beta"));
        assert!(result.content.contains("gamma"));
        assert_eq!(result.metadata["shared"], serde_json::json!("from-b"));
        assert_eq!(result.metadata["merged_count"], serde_json::json!(3));
        assert_eq!(result.tool_calls.len(), 1);
    }

    #[test]
    fn empty_batch_synthesizes_a_result() {
        let result = ResultAggregator::default().aggregate(Vec::new());
        assert_eq!(result.metadata["synthetic"], serde_json::json!(true));
    }

    #[test]
    fn random_returns_one_of_the_inputs() {
        let batch = vec![response("a", "x"), response("b", "y")];
        let result = ResultAggregator::new(AggregationStrategy::Random).aggregate(batch);
        assert!(result.provider == "a" || result.provider == "b");
    }
}
