//! # Scaffold Tutor Server
//!
//! A tutoring chat backend that drives students through a six-stage
//! scaffolded pedagogy (sensemaking → representation → planning → execution
//! → monitoring → reflection), delegating text generation to an LLM
//! provider and persisting conversations in SQLite.
//!
//! ## Features
//!
//! - **Scaffolded tutoring**: per-conversation stage machine with
//!   model-emitted PASS/FAIL evaluations and fail-closed advancement
//! - **Direct & explanation modes**: single-shot tutoring without stage
//!   progression
//! - **Conversation store**: append, edit-with-truncation, and delete over
//!   SQLite
//! - **Forking**: branch any conversation at a message index into a new,
//!   fully independent conversation
//! - **Pluggable providers**: Gemini and OpenAI behind one completion trait
//!
//! ## Architecture
//!
//! ```text
//! Client → RPC Server (stdio) → Tutor Engine → LLM Provider (HTTP)
//!                                    ↓
//!                              SQLite (Conversations)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scaffold_tutor::{Config, AppState, RpcServer};
//! use scaffold_tutor::provider::ProviderRegistry;
//! use scaffold_tutor::store::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let providers = ProviderRegistry::from_config(&config)?;
//!     let state = Arc::new(AppState::new(config, storage, providers));
//!     let server = RpcServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// System prompts for the tutoring stages and modes.
pub mod prompts;
/// LLM completion providers (Gemini, OpenAI).
pub mod provider;
/// JSON-RPC server implementation and request handling.
pub mod server;
/// SQLite conversation store and fork engine.
pub mod store;
/// Scaffolded tutoring stage machine.
pub mod tutor;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, RpcServer, SharedState};
