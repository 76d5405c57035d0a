//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! retry constants for backend calls and Telegram API operations.

use crate::backend::RetryPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Telegram Bot API token
    pub token_bot: String,
    /// Bot username, used only in logs
    pub nombre_bot: Option<String>,

    /// Base URL of the collection store (`/colecciones/{id}/hechos`)
    pub agregador_api_url: Option<String>,
    /// Search endpoint (`?keyword=&page=&tag=`)
    pub metamapa_api_url: Option<String>,
    /// Base URL of the source service (`/hecho`, `/pdis`)
    pub fuentes_api_url: Option<String>,
    /// Base URL of the request-moderation service
    pub solicitudes_base_url: Option<String>,

    /// Attempts per backend call, including the first
    #[serde(default = "default_max_attempts")]
    pub http_max_attempts: u32,
    /// Sleep before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub http_initial_backoff_ms: u64,
    /// Growth factor applied to the sleep after every retry
    #[serde(default = "default_backoff_multiplier")]
    pub http_backoff_multiplier: f64,
    /// Timeout of a single attempt
    #[serde(default = "default_request_timeout_secs")]
    pub http_timeout_secs: u64,
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub http_connect_timeout_secs: u64,
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

const fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Build the layered configuration: optional files, then environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // `APP__HTTP_MAX_ATTEMPTS=5` sets `http_max_attempts`
        .add_source(Environment::with_prefix("APP").separator("__").try_parsing(true))
        // Bare variables: `FUENTES_API_URL` -> `fuentes_api_url`
        .add_source(Environment::default().ignore_empty(true).try_parsing(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Look up a required base URL by its key
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when the URL is unset or blank.
    pub fn require_url(&self, key: &str) -> Result<&str, ConfigError> {
        let value = match key {
            "agregador_api_url" => self.agregador_api_url.as_deref(),
            "metamapa_api_url" => self.metamapa_api_url.as_deref(),
            "fuentes_api_url" => self.fuentes_api_url.as_deref(),
            "solicitudes_base_url" => self.solicitudes_base_url.as_deref(),
            _ => None,
        };
        value
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::NotFound(key.to_uppercase()))
    }

    /// Retry policy shared by the backends
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.http_max_attempts,
            Duration::from_millis(self.http_initial_backoff_ms),
            self.http_backoff_multiplier,
            Duration::from_secs(self.http_timeout_secs),
        )
    }

    /// Connect timeout for the HTTP client
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }
}

// Backend retry defaults
/// Attempts per backend call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// First backoff: 0.8s, then 1.6s, 3.2s, ...
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 800;
/// Backoff growth factor
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Per-attempt timeout; hosted backends can take a while to wake up
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 25;
/// TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Telegram API retry configuration
/// Maximum retries for Telegram send/edit operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff for Telegram operations in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram operations in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            token_bot: "dummy".to_string(),
            http_max_attempts: DEFAULT_MAX_ATTEMPTS,
            http_initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            http_backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            http_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            http_connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            ..Settings::default()
        }
    }

    #[test]
    fn test_require_url() {
        let mut s = settings();
        s.fuentes_api_url = Some("https://fuentes.test/".to_string());
        s.solicitudes_base_url = Some("   ".to_string());

        assert_eq!(
            s.require_url("fuentes_api_url").ok(),
            Some("https://fuentes.test/")
        );
        assert!(matches!(
            s.require_url("solicitudes_base_url"),
            Err(ConfigError::NotFound(key)) if key == "SOLICITUDES_BASE_URL"
        ));
        assert!(s.require_url("metamapa_api_url").is_err());
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let policy = settings().retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.per_attempt_timeout(), Duration::from_secs(25));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(800), Duration::from_millis(1600)]
        );
    }

    #[test]
    fn test_defaults_apply_when_missing() -> Result<(), Box<dyn std::error::Error>> {
        let config = Config::builder()
            .set_override("token_bot", "dummy")?
            .set_override("fuentes_api_url", "https://fuentes.test")?
            .build()?;
        let s: Settings = config.try_deserialize()?;
        assert_eq!(s.http_max_attempts, 3);
        assert_eq!(s.http_initial_backoff_ms, 800);
        assert_eq!(s.http_connect_timeout_secs, 10);
        assert_eq!(s.fuentes_api_url.as_deref(), Some("https://fuentes.test"));
        assert!(s.solicitudes_base_url.is_none());
        Ok(())
    }
}
