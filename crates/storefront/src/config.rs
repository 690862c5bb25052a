//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://{host}:{port}`)
//! - `STOREFRONT_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `STOREFRONT_DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout (default: 10)
//! - `STOREFRONT_DB_STATEMENT_TIMEOUT_MS` - Server-side statement timeout (default: 5000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of requests traced (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Error tracking settings
    pub sentry: SentryConfig,
}

/// Connection pool and timeout settings.
///
/// Implements `Debug` manually to redact the connection string.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub url: SecretString,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long a request waits for a pooled connection
    pub acquire_timeout: Duration,
    /// `statement_timeout` applied to every connection
    pub statement_timeout: Duration,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Sentry settings. Error tracking is disabled without a DSN.
#[derive(Clone, Default)]
pub struct SentryConfig {
    /// Sentry DSN (contains the project key)
    pub dsn: Option<SecretString>,
    /// Environment tag (e.g. `production`)
    pub environment: Option<String>,
    /// Fraction of transactions sent as traces
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
    }
}

impl StorefrontConfig {
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

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host: IpAddr = env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = env.parse_or("STOREFRONT_PORT", 3000)?;
        let base_url = env
            .get("STOREFRONT_BASE_URL")
            .map_or_else(|| format!("http://{host}:{port}"), |url| {
                url.trim_end_matches('/').to_string()
            });

        let database = DatabaseConfig {
            url: env.database_url("STOREFRONT_DATABASE_URL")?,
            max_connections: env.parse_or("STOREFRONT_DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(
                env.parse_or("STOREFRONT_DB_ACQUIRE_TIMEOUT_SECS", 10)?,
            ),
            statement_timeout: Duration::from_millis(
                env.parse_or("STOREFRONT_DB_STATEMENT_TIMEOUT_MS", 5000)?,
            ),
        };
        if database.max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let traces_sample_rate: f32 = env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?;
        if !(0.0..=1.0).contains(&traces_sample_rate) {
            return Err(ConfigError::InvalidEnvVar(
                "SENTRY_TRACES_SAMPLE_RATE".to_string(),
                "must be between 0.0 and 1.0".to_string(),
            ));
        }
        let sentry = SentryConfig {
            dsn: env.get("SENTRY_DSN").map(SecretString::from),
            environment: env.get("SENTRY_ENVIRONMENT"),
            traces_sample_rate,
        };

        Ok(Self {
            host,
            port,
            base_url,
            database,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the session cookie should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Environment lookup with typed accessors. Empty values count as unset.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse a variable, using `default` when it is unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.get(primary_key)
            .or_else(|| self.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOREFRONT_DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.database.statement_timeout, Duration::from_millis(5000));
        assert!(config.sentry.dsn.is_none());
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/shop")]).unwrap();
        assert_eq!(
            config.database.url.expose_secret(),
            "postgres://fallback/shop"
        );
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "STOREFRONT_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("STOREFRONT_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "STOREFRONT_PORT"));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let err = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("STOREFRONT_DB_MAX_CONNECTIONS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_sample_rate_out_of_range() {
        let err = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("SENTRY_TRACES_SAMPLE_RATE", "1.5"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "SENTRY_TRACES_SAMPLE_RATE"));
    }

    #[test]
    fn test_https_base_url_enables_secure_cookies() {
        let config = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/shop"),
            ("STOREFRONT_BASE_URL", "https://shop.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://shop.example.com");
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://shop:hunter2@db/shop"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("key@sentry"));
    }
}
