use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::store::ForkStagePolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub providers: ProviderConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub tutor: TutorConfig,
}

/// Completion provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini: GeminiConfig,
    /// OpenAI is optional; selecting an `openai-*` service without
    /// credentials fails at dispatch time.
    pub openai: Option<OpenAiConfig>,
}

/// Gemini API configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// OpenAI API configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration.
///
/// Provider calls are never retried; a failed call surfaces as a failed
/// turn with nothing persisted.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Tutoring behavior configuration
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Service used when a request names none and the conversation has none.
    pub default_service: String,
    /// Whether a fork inherits the parent's stage progress or restarts at
    /// sensemaking. Callers may override per fork.
    pub fork_stage_policy: ForkStagePolicy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gemini = GeminiConfig {
            api_key: env::var("GEMINI_API_KEY").map_err(|_| AppError::Config {
                message: "GEMINI_API_KEY is required".to_string(),
            })?,
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash-lite".to_string()),
        };

        let openai = env::var("OPENAI_API_KEY").ok().map(|api_key| OpenAiConfig {
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        });

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/tutor.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
        };

        let tutor = TutorConfig {
            default_service: env::var("DEFAULT_SERVICE")
                .unwrap_or_else(|_| "gemini-direct".to_string()),
            fork_stage_policy: env::var("FORK_STAGE_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(ForkStagePolicy::Reset),
        };

        Ok(Config {
            providers: ProviderConfig { gemini, openai },
            database,
            logging,
            request,
            tutor,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            default_service: "gemini-direct".to_string(),
            fork_stage_policy: ForkStagePolicy::Reset,
        }
    }
}
