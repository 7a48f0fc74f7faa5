use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{ChatMessage, ChatRole, CompletionProvider};
use crate::config::{GeminiConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::prompts::TITLE_PROMPT;

/// Acknowledgement seeded as the model's reply to the system prompt, since
/// the generateContent API has no dedicated system role for multi-turn use.
const INSTRUCTION_ACK: &str = "Understood. I will follow these instructions.";

/// Provider backed by Google's Gemini generateContent API
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: &GeminiConfig, request_config: &RequestConfig) -> ProviderResult<Self> {
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

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// The generateContent contents list: the system prompt is delivered as
    /// an opening user/model exchange, followed by the real history.
    fn build_contents(system_prompt: &str, history: &[ChatMessage]) -> Vec<Content> {
        let mut contents = Vec::with_capacity(history.len() + 2);
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: format!(
                    "{}\n\nPlease acknowledge these instructions.",
                    system_prompt
                ),
            }],
        });
        contents.push(Content {
            role: "model".to_string(),
            parts: vec![Part {
                text: INSTRUCTION_ACK.to_string(),
            }],
        });
        for message in history {
            contents.push(Content {
                role: match message.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                }
                .to_string(),
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            });
        }
        contents
    }

    async fn generate(&self, contents: Vec<Content>) -> ProviderResult<String> {
        let url = self.endpoint();
        debug!(model = %self.model, contents = contents.len(), "Calling Gemini");

        let request = GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 1000,
            },
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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
                "Gemini request failed"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let text = body
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "Response contained no candidates".to_string(),
            })?;

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            "Gemini completion succeeded"
        );
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> ProviderResult<String> {
        let contents = Self::build_contents(system_prompt, history);
        self.generate(contents).await
    }

    async fn generate_title(&self, message: &str) -> ProviderResult<String> {
        let contents = vec![Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: format!("{}{}", TITLE_PROMPT, message),
            }],
        }];
        let title = self.generate(contents).await?;
        Ok(title.trim().to_string())
    }
}
