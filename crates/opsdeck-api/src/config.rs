// Process configuration
//
// ApiConfig is read once from the environment in main and passed by value
// into the components that need it.

use opsdeck_core::EngineConfig;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
const DEV_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Postgres URL; in-memory stores are used when absent
    pub database_url: Option<String>,
    pub port: u16,
    /// Prefix for API routes, e.g. "/api"
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    /// Slack bot token; the Slack client runs in mock mode without one
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: String,
    pub engine: EngineConfig,
}

impl ApiConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let mut cors_origins: Vec<String> = var("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        for origin in [var("FRONTEND_URL"), Some(DEV_FRONTEND_ORIGIN.to_string())]
            .into_iter()
            .flatten()
        {
            if !cors_origins.contains(&origin) {
                cors_origins.push(origin);
            }
        }

        let mut engine = EngineConfig::default();
        if let Some(attempts) = var("ENGINE_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            engine = engine.with_max_attempts(attempts);
        }
        if let Some(millis) = var("ENGINE_BACKOFF_BASE_MS").and_then(|v| v.parse().ok()) {
            engine = engine.with_backoff_base(Duration::from_millis(millis));
        }

        Self {
            database_url: var("DATABASE_URL"),
            port,
            api_prefix: var("API_PREFIX").unwrap_or_default(),
            cors_origins,
            slack_bot_token: var("SLACK_BOT_TOKEN"),
            slack_api_base_url: var("SLACK_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SLACK_API_BASE_URL.to_string()),
            engine,
        }
    }
}
