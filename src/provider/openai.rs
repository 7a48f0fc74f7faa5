use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{ChatMessage, ChatRole, CompletionProvider};
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::prompts::TITLE_PROMPT;

/// Provider backed by the OpenAI chat completions API
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: &OpenAiConfig, request_config: &RequestConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_messages(system_prompt: &str, history: &[ChatMessage]) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        for message in history {
            messages.push(WireMessage {
                role: match message.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "assistant",
                }
                .to_string(),
                content: message.content.clone(),
            });
        }
        messages
    }

    async fn chat(&self, messages: Vec<WireMessage>) -> ProviderResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, messages = messages.len(), "Calling OpenAI");

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.7,
            max_tokens: 1000,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                latency_ms = start.elapsed().as_millis(),
                "OpenAI request failed"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })?;

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            "OpenAI completion succeeded"
        );
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> ProviderResult<String> {
        let messages = Self::build_messages(system_prompt, history);
        self.chat(messages).await
    }

    async fn generate_title(&self, message: &str) -> ProviderResult<String> {
        let messages = vec![WireMessage {
            role: "user".to_string(),
            content: format!("{}{}", TITLE_PROMPT, message),
        }];
        let title = self.chat(messages).await?;
        Ok(title.trim().to_string())
    }
}
