use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tutoring error: {0}")]
    Tutor(#[from] TutorError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("Invalid message index {index} (conversation has {len} messages)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Message at index {index} has role {role}; only student messages are allowed here")]
    InvalidRole { index: usize, role: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Completion provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Missing credentials for provider {provider}")]
    MissingCredentials { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Tutoring stage machine errors
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("Unsupported tutor mode: {mode}")]
    UnsupportedMode { mode: String },

    #[error("Empty message: {reason}")]
    EmptyMessage { reason: String },
}

/// JSON-RPC boundary errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    #[error("Invalid parameters for {method}: {message}")]
    InvalidParameters { method: String, message: String },

    #[error("Method execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        RpcError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl AppError {
    /// JSON-RPC error code for this error, used by the server boundary to
    /// keep client-error and server-error cases distinguishable.
    pub fn rpc_code(&self) -> i32 {
        match self {
            AppError::Storage(StorageError::ConversationNotFound { .. }) => -32001,
            AppError::Storage(StorageError::InvalidIndex { .. }) => -32002,
            AppError::Storage(StorageError::InvalidRole { .. }) => -32003,
            AppError::Tutor(TutorError::UnsupportedMode { .. }) => -32004,
            AppError::Tutor(TutorError::EmptyMessage { .. }) => -32005,
            AppError::Provider(_) => -32010,
            AppError::Rpc(RpcError::UnknownMethod { .. }) => -32601,
            AppError::Rpc(RpcError::InvalidParameters { .. }) => -32602,
            _ => -32603,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;
