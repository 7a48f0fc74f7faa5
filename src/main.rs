use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scaffold_tutor::{
    config::{Config, LogFormat},
    provider::ProviderRegistry,
    server::{AppState, RpcServer},
    store::SqliteStorage,
};

/// Scaffolded tutoring chat server over stdio JSON-RPC
#[derive(Parser, Debug)]
#[command(name = "scaffold-tutor", version, about)]
struct Cli {
    /// Path to the SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Log level filter (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON instead of human-readable text
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Apply CLI overrides
    if let Some(database) = cli.database {
        config.database.path = database;
    }
    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }
    if cli.log_json {
        config.logging.format = LogFormat::Json;
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Scaffold tutor server starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize completion providers
    let providers = match ProviderRegistry::from_config(&config) {
        Ok(p) => {
            info!(
                openai_enabled = config.providers.openai.is_some(),
                "Completion providers initialized"
            );
            p
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize providers");
            return Err(e.into());
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config, storage, providers));

    // Start the server
    let server = RpcServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
