use crate::chain::Chain;
use crate::error::ExecutionError;
use crate::substitution::{Responses, substitute};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod simulator;

pub use simulator::SimulatedBackend;

/// Prompt used when a chain has no final prompt of its own.
pub const DEFAULT_FINAL_PROMPT: &str = "Generate content based on the following inputs:";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl TokenUsage {
    /// Builds a usage record whose total is always the sum of its parts.
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

/// The result of running a chain once. Not persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub token_usage: TokenUsage,
}

/// What a backend is asked to complete.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub responses: &'a Responses,
    pub api_key: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// A language-model backend. Real integrations map provider failures onto [`ExecutionError`].
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ExecutionError>;
}

/// Resolves a chain's prompt and hands it to a backend.
pub struct ChainExecutor {
    backend: Box<dyn ExecutionBackend>,
}

impl ChainExecutor {
    pub fn new(backend: impl ExecutionBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The chain's final prompt with every supplied variable substituted.
    pub fn resolve_prompt(chain: &Chain, responses: &Responses) -> String {
        let template = if chain.final_prompt.trim().is_empty() {
            DEFAULT_FINAL_PROMPT
        } else {
            chain.final_prompt.as_str()
        };
        substitute(template, responses)
    }

    pub async fn execute(
        &self,
        chain: &Chain,
        responses: &Responses,
        model: &str,
        api_key: Option<&str>,
    ) -> Result<ResponseRecord, ExecutionError> {
        let prompt = Self::resolve_prompt(chain, responses);
        let request = CompletionRequest {
            model,
            prompt: &prompt,
            responses,
            api_key,
        };

        tracing::debug!(
            backend = self.backend.name(),
            model,
            chain = ?chain.id,
            prompt_len = prompt.len(),
            "Executing chain"
        );
        let completion = self.backend.complete(&request).await.inspect_err(|e| {
            tracing::warn!(model, error = %e, retryable = e.is_retryable(), "Chain execution failed");
        })?;

        Ok(ResponseRecord {
            prompt,
            response: completion.text,
            model: model.to_string(),
            token_usage: completion.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Node;
    use tokio_test::block_on;

    struct RateLimitedBackend;

    #[async_trait]
    impl ExecutionBackend for RateLimitedBackend {
        fn name(&self) -> &str {
            "rate-limited"
        }

        async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<Completion, ExecutionError> {
            Err(ExecutionError::RateLimited {
                retry_after_secs: Some(30),
            })
        }
    }

    fn responses(pairs: &[(&str, &str)]) -> Responses {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn executes_with_the_simulator() {
        let mut chain = Chain::new("Pitch").with_final_prompt("Pitch {{name}} in one line.");
        chain.add_node(Node::new("n1", "Name", "name")).unwrap();

        let executor = ChainExecutor::new(SimulatedBackend::new());
        let record = block_on(executor.execute(
            &chain,
            &responses(&[("name", "Acme")]),
            "gpt-4-turbo-preview",
            None,
        ))
        .unwrap();

        assert_eq!(record.prompt, "Pitch Acme in one line.");
        assert_eq!(record.model, "gpt-4-turbo-preview");
        assert!(record.response.contains("name"));
        assert!(record.response.contains("gpt-4-turbo-preview"));
        assert_eq!(
            record.token_usage.total,
            record.token_usage.prompt + record.token_usage.completion
        );
    }

    #[test]
    fn blank_final_prompt_falls_back_to_the_default() {
        let chain = Chain::new("Empty");
        let prompt = ChainExecutor::resolve_prompt(&chain, &Responses::new());
        assert_eq!(prompt, DEFAULT_FINAL_PROMPT);
    }

    #[test]
    fn backend_failures_propagate_with_their_classification() {
        let executor = ChainExecutor::new(RateLimitedBackend);
        let err = block_on(executor.execute(&Chain::new("x"), &Responses::new(), "m", Some("k")))
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!ExecutionError::InvalidApiKey.is_retryable());
    }
}
