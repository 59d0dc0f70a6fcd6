use super::{Completion, Provider};
use crate::constants::{FALLBACK_LLM_TIMEOUT_SECS, LLM_MAX_OUTPUT_TOKENS, LLM_TEMPERATURE};
use crate::{CoreError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Talks to an OpenAI-compatible Chat Completions API. Used as the fallback
/// leg of the chain; gets a longer timeout since it's only reached after the
/// primary has already failed.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FALLBACK_LLM_TIMEOUT_SECS))
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
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CoreError::Config("FALLBACK_LLM_API_KEY is not set".to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            temperature: LLM_TEMPERATURE,
            max_tokens: LLM_MAX_OUTPUT_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
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
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(CoreError::Http)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            provider_id: self.id().to_string(),
            input_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_response_extracts_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}],"usage":{"prompt_tokens":5,"completion_tokens":1}}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiProvider::new(Some("key".into()), server.url(), "m".into());
        let completion = provider.complete("sys", "prompt").await.unwrap();
        assert_eq!(completion.text, "hi");
        assert_eq!(completion.output_tokens, Some(1));
    }

    #[tokio::test]
    async fn non_2xx_becomes_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let provider = OpenAiProvider::new(Some("key".into()), server.url(), "m".into());
        let err = provider.complete("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, CoreError::Provider(_)));
    }
}
