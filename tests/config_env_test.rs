//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Note that Config::from_env() also loads
//! from .env file via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use scaffold_tutor::config::{Config, LogFormat};
use scaffold_tutor::store::ForkStagePolicy;
use serial_test::serial;
use std::env;

fn set_required_vars() {
    env::set_var("GEMINI_API_KEY", "test_key");
}

#[test]
#[serial]
fn test_config_requires_gemini_api_key() {
    env::remove_var("GEMINI_API_KEY");

    let result = Config::from_env();
    assert!(result.is_err(), "Config must fail without GEMINI_API_KEY");
}

#[test]
#[serial]
fn test_config_defaults() {
    set_required_vars();
    env::remove_var("GEMINI_BASE_URL");
    env::remove_var("GEMINI_MODEL");
    env::remove_var("OPENAI_API_KEY");
    env::remove_var("DATABASE_PATH");
    env::remove_var("DEFAULT_SERVICE");
    env::remove_var("FORK_STAGE_POLICY");
    env::remove_var("REQUEST_TIMEOUT_MS");

    let config = Config::from_env().unwrap();

    assert_eq!(
        config.providers.gemini.base_url,
        "https://generativelanguage.googleapis.com"
    );
    assert_eq!(config.providers.gemini.model, "gemini-2.0-flash-lite");
    assert!(config.providers.openai.is_none());
    assert_eq!(config.database.path.to_str().unwrap(), "./data/tutor.db");
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.tutor.default_service, "gemini-direct");
    assert_eq!(config.tutor.fork_stage_policy, ForkStagePolicy::Reset);
}

#[test]
#[serial]
fn test_config_custom_database() {
    set_required_vars();
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_openai_enabled_by_key_presence() {
    set_required_vars();
    env::set_var("OPENAI_API_KEY", "openai_test_key");
    env::set_var("OPENAI_MODEL", "gpt-4o");

    let config = Config::from_env().unwrap();
    let openai = config.providers.openai.expect("OpenAI should be enabled");
    assert_eq!(openai.api_key, "openai_test_key");
    assert_eq!(openai.model, "gpt-4o");
    assert_eq!(openai.base_url, "https://api.openai.com");

    env::remove_var("OPENAI_API_KEY");
    env::remove_var("OPENAI_MODEL");
}

#[test]
#[serial]
fn test_config_fork_stage_policy_override() {
    set_required_vars();
    env::set_var("FORK_STAGE_POLICY", "inherit");

    let config = Config::from_env().unwrap();
    assert_eq!(config.tutor.fork_stage_policy, ForkStagePolicy::Inherit);

    env::remove_var("FORK_STAGE_POLICY");
}

#[test]
#[serial]
fn test_config_invalid_fork_stage_policy_falls_back() {
    set_required_vars();
    env::set_var("FORK_STAGE_POLICY", "branch");

    let config = Config::from_env().unwrap();
    assert_eq!(config.tutor.fork_stage_policy, ForkStagePolicy::Reset);

    env::remove_var("FORK_STAGE_POLICY");
}

#[test]
#[serial]
fn test_config_log_format() {
    set_required_vars();
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::set_var("LOG_FORMAT", "pretty");
    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_request_timeout_override() {
    set_required_vars();
    env::set_var("REQUEST_TIMEOUT_MS", "5000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 5000);

    env::remove_var("REQUEST_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_default_service_override() {
    set_required_vars();
    env::set_var("DEFAULT_SERVICE", "gemini-scaffolding");

    let config = Config::from_env().unwrap();
    assert_eq!(config.tutor.default_service, "gemini-scaffolding");

    env::remove_var("DEFAULT_SERVICE");
}
