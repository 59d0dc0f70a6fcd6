use super::{Completion, Provider};
use crate::constants::{LLM_MAX_OUTPUT_TOKENS, LLM_TEMPERATURE, PRIMARY_LLM_TIMEOUT_SECS};
use crate::{CoreError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Talks to an Anthropic-compatible Messages API. The base URL and model
/// are configurable so a self-hosted gateway can stand in transparently.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PRIMARY_LLM_TIMEOUT_SECS))
            .build()
            .expect("reqwest client should build with static config");
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<MessageIn<'a>>,
}

#[derive(Serialize)]
struct MessageIn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CoreError::Config("PRIMARY_LLM_API_KEY is not set".to_string()))?;

        let body = MessagesRequest {
            model: &self.model,
            system,
            max_tokens: LLM_MAX_OUTPUT_TOKENS,
            temperature: LLM_TEMPERATURE,
            messages: vec![MessageIn {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(CoreError::Http)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(CoreError::Http)?;
        let text = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion {
            text,
            provider_id: self.id().to_string(),
            input_tokens: parsed.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: parsed.usage.as_ref().and_then(|u| u.output_tokens),
        })
    }
}
