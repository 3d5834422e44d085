//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIE_API_URL` - Base URL of the shop backend (e.g., `https://api.atelie.com.br/api`)
//! - `ATELIE_ADMIN_TOKEN` - Admin bearer token for the backend (high entropy)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `ATELIE_TENANT_ID` - Tenant sent in `X-Tenant-ID` (default: atelie-aruanda)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default tenant identifier.
pub const DEFAULT_TENANT_ID: &str = "atelie-aruanda";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Backend base URL, without trailing slash
    pub api_url: Url,
    /// Admin bearer token for the backend
    pub admin_token: SecretString,
    /// Tenant sent with every backend request
    pub tenant_id: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_url", &self.api_url.as_str())
            .field("admin_token", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[SET]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the admin token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;
        let api_url = parse_api_url("ATELIE_API_URL", &get_required_env("ATELIE_API_URL")?)?;
        let admin_token = get_validated_secret("ATELIE_ADMIN_TOKEN")?;
        let tenant_id = get_env_or_default("ATELIE_TENANT_ID", DEFAULT_TENANT_ID);
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            api_url,
            admin_token,
            tenant_id,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an http(s) base URL, dropping any trailing slash.
fn parse_api_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_placeholder_tokens_rejected() {
        for token in ["your-admin-token", "changeme123", "xxxxxxxx"] {
            let err = validate_secret_strength(token, "ATELIE_ADMIN_TOKEN").unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        }
    }

    #[test]
    fn test_low_entropy_token_rejected() {
        let err = validate_secret_strength(&"ab".repeat(20), "ATELIE_ADMIN_TOKEN").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_random_token_accepted() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "ATELIE_ADMIN_TOKEN").is_ok());
    }

    #[test]
    fn test_parse_api_url() {
        let url = parse_api_url("ATELIE_API_URL", "https://api.atelie.com.br/api/").unwrap();
        assert_eq!(url.as_str(), "https://api.atelie.com.br/api");
        assert!(parse_api_url("ATELIE_API_URL", "ftp://files").is_err());
        assert!(parse_api_url("ATELIE_API_URL", "not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AdminConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            api_url: "http://localhost:8080/api".parse().unwrap(),
            admin_token: SecretString::from("super-sensitive-admin-token"),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-sensitive-admin-token"));
        assert_eq!(config.socket_addr().port(), 3001);
    }
}
