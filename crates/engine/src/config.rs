//! Process configuration loaded from environment variables, mirroring the
//! teacher's `api::config::Config` (env-var driven, `Default` impl,
//! unit-tested) and extended with the knobs spec §4.4/§5 call for: the
//! broker URL, the optional Postgres URL, the publish-retry count, and the
//! per-call timeout.

use std::time::Duration;

/// Engine process configuration.
///
/// Reads from environment variables:
/// - `HOST` — bind address for the health/metrics HTTP surface (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8080`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `AMQP_URL` — AMQP broker URI; when unset the engine runs against the
///   in-memory message bus, useful for local development and the seed tests.
/// - `DATABASE_URL` — Postgres connection string; when unset the engine runs
///   against the in-memory Saga State Store and Order Record Store.
/// - `PUBLISH_RETRIES` — publish-with-retry attempt count (default: `3`, §4.4)
/// - `CALL_TIMEOUT_SECONDS` — per-external-call timeout (default: `10`, §5)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub amqp_url: Option<String>,
    pub database_url: Option<String>,
    pub publish_retries: u32,
    pub call_timeout_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            amqp_url: std::env::var("AMQP_URL").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
            publish_retries: std::env::var("PUBLISH_RETRIES")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(messaging::DEFAULT_PUBLISH_RETRIES),
            call_timeout_seconds: std::env::var("CALL_TIMEOUT_SECONDS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
        }
    }

    /// Returns the `"host:port"` bind address string for the HTTP surface.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The per-external-call timeout as a `Duration` (§5 "Suspension points").
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            amqp_url: None,
            database_url: None,
            publish_retries: messaging::DEFAULT_PUBLISH_RETRIES,
            call_timeout_seconds: 10,
        }
    }
}
