//! LLM Fallback Chain: a primary provider tried first, falling back to a
//! secondary provider on any failure. Mirrors the teacher's circuit-breaker
//! wrapped CLI client in spirit — always try the preferred path, never let a
//! single provider's outage stall the generator loop — but over HTTP instead
//! of a subprocess, since both configured providers here are REST APIs.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::config::LlmConfig;
use crate::{CoreError, Result};
use async_trait::async_trait;

/// A single completed chat call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub provider_id: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier surfaced in [`Completion::provider_id`] and logs.
    fn id(&self) -> &str;

    /// Sends `prompt` as a single user turn with `system` as the system
    /// prompt. Implementations must map an HTTP 429 to
    /// [`CoreError::RateLimited`] so the chain can distinguish it from other
    /// failures, though both currently trigger the same fallback behavior.
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion>;
}

/// Tries the primary provider, then the fallback provider on any error.
pub struct FallbackChain {
    primary: Box<dyn Provider>,
    fallback: Box<dyn Provider>,
}

impl FallbackChain {
    pub fn new(primary: Box<dyn Provider>, fallback: Box<dyn Provider>) -> Self {
        Self { primary, fallback }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            Box::new(AnthropicProvider::new(
                config.primary_api_key.clone(),
                config.primary_base_url.clone(),
                config.primary_model.clone(),
            )),
            Box::new(OpenAiProvider::new(
                config.fallback_api_key.clone(),
                config.fallback_base_url.clone(),
                config.fallback_model.clone(),
            )),
        )
    }

    pub async fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        match self.primary.complete(system, prompt).await {
            Ok(completion) => Ok(completion),
            Err(primary_err) => {
                tracing::warn!(
                    provider = self.primary.id(),
                    error = %primary_err,
                    "primary provider failed, falling back"
                );
                self.fallback.complete(system, prompt).await.map_err(|fallback_err| {
                    tracing::error!(
                        primary = self.primary.id(),
                        fallback = self.fallback.id(),
                        primary_error = %primary_err,
                        fallback_error = %fallback_err,
                        "both providers failed"
                    );
                    fallback_err
                })
            }
        }
    }
}
