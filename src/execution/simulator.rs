use super::{Completion, CompletionRequest, ExecutionBackend, TokenUsage};
use crate::error::ExecutionError;
use async_trait::async_trait;
use itertools::Itertools;
use std::time::Duration;

const SIMULATED_PROMPT_TOKENS: u32 = 150;
const SIMULATED_COMPLETION_TOKENS: u32 = 320;

/// A stand-in for a real model call. Never fails and always reports the same usage.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every completion, to mimic network latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ExecutionError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let inputs = request.responses.keys().join(", ");
        let text = format!(
            "Based on your inputs, here's a generated response that incorporates {}. \
             This would normally be generated by {} using your OpenRouter API key.\n\n\
             Generated content with personalized elements based on your specific requirements and preferences.",
            inputs, request.model
        );

        Ok(Completion {
            text,
            usage: TokenUsage::new(SIMULATED_PROMPT_TOKENS, SIMULATED_COMPLETION_TOKENS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::Responses;
    use tokio_test::block_on;

    #[test]
    fn usage_is_fixed_and_consistent() {
        let mut responses = Responses::new();
        responses.insert("b".to_string(), "2".to_string());
        responses.insert("a".to_string(), "1".to_string());
        let request = CompletionRequest {
            model: "claude-3-opus",
            prompt: "ignored",
            responses: &responses,
            api_key: None,
        };

        let completion = block_on(SimulatedBackend::new().complete(&request)).unwrap();
        assert_eq!(completion.usage, TokenUsage { prompt: 150, completion: 320, total: 470 });
        assert!(completion.text.contains("incorporates a, b."));
        assert!(completion.text.contains("claude-3-opus"));
    }
}
