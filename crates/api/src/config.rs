//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTWHEEL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `CARTWHEEL_HOST` - Bind address (default: 127.0.0.1)
//! - `CARTWHEEL_PORT` - Listen port (default: 8080)
//! - `CARTWHEEL_ASSET_BASE_URL` - Prefix for stored image paths (default: `http://localhost:8080/`)
//! - `CARTWHEEL_TOKEN_TTL_SECS` - Access token lifetime (default: 3600)
//! - `CARTWHEEL_NODE_ID` - Id generator node, 0-1023 (default: 1)
//! - `CARTWHEEL_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `CARTWHEEL_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::services::ids::MAX_NODE_ID;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Base URL stored image paths are resolved against (always ends in `/`)
    pub asset_base_url: Url,
    /// Lifetime of issued access tokens
    pub token_ttl: Duration,
    /// Node id for the id generator
    pub node_id: u16,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Log line format for the server binary
    pub log_format: LogFormat,
    /// Sentry error tracking
    pub sentry: SentryConfig,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// Sentry DSN; Sentry is disabled when unset
    pub dsn: Option<String>,
    /// Environment tag
    pub environment: Option<String>,
    /// Error event sample rate
    pub sample_rate: f32,
    /// Performance trace sample rate
    pub traces_sample_rate: f32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env
            .get("CARTWHEEL_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTWHEEL_DATABASE_URL".to_string()))?;

        let host = env.parse("CARTWHEEL_HOST", "127.0.0.1")?;
        let port = env.parse("CARTWHEEL_PORT", "8080")?;

        let asset_base_url =
            parse_base_url(&env.get_or("CARTWHEEL_ASSET_BASE_URL", "http://localhost:8080/"))?;

        let ttl_secs: u32 = env.parse("CARTWHEEL_TOKEN_TTL_SECS", "3600")?;
        let token_ttl = Duration::seconds(i64::from(ttl_secs));

        let node_id: u16 = env.parse("CARTWHEEL_NODE_ID", "1")?;
        if node_id > MAX_NODE_ID {
            return Err(ConfigError::InvalidEnvVar(
                "CARTWHEEL_NODE_ID".to_string(),
                format!("must be at most {MAX_NODE_ID}"),
            ));
        }

        let db_max_connections = env.parse("CARTWHEEL_DB_MAX_CONNECTIONS", "10")?;
        let log_format = env.parse("CARTWHEEL_LOG_FORMAT", "pretty")?;

        let sentry = SentryConfig {
            dsn: env.get("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            environment: env.get("SENTRY_ENVIRONMENT"),
            sample_rate: env.parse("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: env.parse("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            asset_base_url,
            token_ttl,
            node_id,
            db_max_connections,
            log_format,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Public URL of a stored image path.
    #[must_use]
    pub fn asset_url(&self, path: &str) -> String {
        let relative = path.trim_start_matches('/');
        self.asset_base_url.join(relative).map_or_else(
            |_| format!("{}{relative}", self.asset_base_url),
            String::from,
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_or(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

/// Parse a base URL, forcing a trailing slash so `join` appends rather than
/// replaces the last path segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("CARTWHEEL_ASSET_BASE_URL".to_string(), e.to_string())
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CARTWHEEL_DATABASE_URL", "postgres://localhost/cartwheel")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.asset_base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.token_ttl, Duration::hours(1));
        assert_eq!(config.node_id, 1);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(var) if var == "CARTWHEEL_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[
            ("CARTWHEEL_DATABASE_URL", "postgres://localhost/db"),
            ("CARTWHEEL_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(var, _) if var == "CARTWHEEL_PORT"));
    }

    #[test]
    fn test_log_format() {
        let config = load(&[
            ("CARTWHEEL_DATABASE_URL", "postgres://localhost/db"),
            ("CARTWHEEL_LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.log_format, LogFormat::Json);

        let err = load(&[
            ("CARTWHEEL_DATABASE_URL", "postgres://localhost/db"),
            ("CARTWHEEL_LOG_FORMAT", "xml"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(var, _) if var == "CARTWHEEL_LOG_FORMAT"));
    }

    #[test]
    fn test_node_id_range() {
        let err = load(&[
            ("CARTWHEEL_DATABASE_URL", "postgres://localhost/db"),
            ("CARTWHEEL_NODE_ID", "1024"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(var, _) if var == "CARTWHEEL_NODE_ID"));
    }

    #[test]
    fn test_asset_url_prefixing() {
        let config = load(&[
            ("CARTWHEEL_DATABASE_URL", "postgres://localhost/db"),
            ("CARTWHEEL_ASSET_BASE_URL", "https://cdn.example.com/static"),
        ])
        .unwrap();

        assert_eq!(
            config.asset_url("uploads/a.png"),
            "https://cdn.example.com/static/uploads/a.png"
        );
        assert_eq!(
            config.asset_url("/uploads/b.png"),
            "https://cdn.example.com/static/uploads/b.png"
        );
    }

    #[test]
    fn test_database_url_not_in_debug() {
        let config = load(&[("CARTWHEEL_DATABASE_URL", "postgres://user:hunter2@db/x")]).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
