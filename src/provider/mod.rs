//! LLM completion providers.
//!
//! Each provider adapts one HTTP chat-completion API to the
//! [`CompletionProvider`] trait the tutoring engine consumes. Providers are
//! stateless: the full conversation history and system prompt are supplied
//! on every call.

mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, ProviderError, ProviderResult};

/// Which backend vendor a service identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini generateContent API.
    Gemini,
    /// OpenAI chat completions API.
    OpenAi,
}

impl ProviderKind {
    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Role of a chat history entry as seen by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// Human turn.
    User,
    /// Model turn.
    Model,
}

/// One history entry of a completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Who produced the entry.
    pub role: ChatRole,
    /// Entry text.
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create a model message
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
///
/// Implementations make exactly one HTTP request per call. Failures are
/// surfaced as [`ProviderError`] and never retried here; the caller decides
/// what a failed turn means.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request a completion for `history` under `system_prompt`.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> ProviderResult<String>;

    /// Generate a short conversation title from an opening message.
    async fn generate_title(&self, message: &str) -> ProviderResult<String>;
}

/// The set of configured providers, keyed by [`ProviderKind`].
///
/// Gemini is always present; OpenAI only when credentials were configured.
#[derive(Clone)]
pub struct ProviderRegistry {
    gemini: Arc<dyn CompletionProvider>,
    openai: Option<Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let gemini = Arc::new(GeminiProvider::new(
            &config.providers.gemini,
            &config.request,
        )?) as Arc<dyn CompletionProvider>;

        let openai = config
            .providers
            .openai
            .as_ref()
            .map(|openai_config| {
                OpenAiProvider::new(openai_config, &config.request)
                    .map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
            })
            .transpose()?;

        Ok(Self { gemini, openai })
    }

    /// Build a registry directly from provider instances (test hook).
    pub fn from_parts(
        gemini: Arc<dyn CompletionProvider>,
        openai: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self { gemini, openai }
    }

    /// Look up the provider for `kind`.
    pub fn get(&self, kind: ProviderKind) -> ProviderResult<Arc<dyn CompletionProvider>> {
        match kind {
            ProviderKind::Gemini => Ok(Arc::clone(&self.gemini)),
            ProviderKind::OpenAi => self.openai.clone().ok_or_else(|| {
                ProviderError::MissingCredentials {
                    provider: ProviderKind::OpenAi.as_str().to_string(),
                }
            }),
        }
    }
}
