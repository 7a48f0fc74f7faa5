//! Server module for JSON-RPC request handling.
//!
//! This module provides:
//! - JSON-RPC 2.0 server implementation over stdio
//! - Method handlers and routing
//! - Shared application state management

mod handlers;
mod rpc;

pub use handlers::*;
pub use rpc::*;

use std::sync::Arc;

use crate::config::Config;
use crate::provider::ProviderRegistry;
use crate::store::SqliteStorage;
use crate::tutor::TutorEngine;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Configured completion providers.
    pub providers: ProviderRegistry,
    /// The tutoring engine.
    pub engine: TutorEngine,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage, providers: ProviderRegistry) -> Self {
        let engine = TutorEngine::new(
            Arc::new(storage.clone()),
            providers.clone(),
            config.tutor.default_service.clone(),
            config.tutor.fork_stage_policy,
        );

        Self {
            config,
            storage,
            providers,
            engine,
        }
    }
}

/// Shared application state type.
pub type SharedState = Arc<AppState>;
