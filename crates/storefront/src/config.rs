//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIE_API_URL` - Base URL of the shop backend (e.g., `https://api.atelie.com.br/api`)
//!
//! ## Optional
//! - `ATELIE_TENANT_ID` - Tenant sent in `X-Tenant-ID` (default: atelie-aruanda)
//! - `ATELIE_DATA_DIR` - Directory for persisted session and cart files (default: .atelie)
//! - `ATELIE_MODERATION_THRESHOLD` - NSFW probability above which images are rejected (default: 0.6)
//! - `ATELIE_CATEGORY_CACHE_TTL_SECS` - Category cache lifetime (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default tenant identifier.
pub const DEFAULT_TENANT_ID: &str = "atelie-aruanda";

/// Default NSFW rejection threshold.
pub const DEFAULT_MODERATION_THRESHOLD: f32 = 0.6;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend base URL. Paths such as `/products` are appended to it.
    pub api_url: Url,
    /// Tenant sent with every request
    pub tenant_id: String,
    /// Directory for locally persisted state
    pub data_dir: PathBuf,
    /// Moderation rejection threshold in `[0, 1]`
    pub moderation_threshold: f32,
    /// Category cache lifetime
    pub category_cache_ttl: Duration,
}

impl StorefrontConfig {
    /// Configuration with defaults for everything except the backend URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            data_dir: PathBuf::from(".atelie"),
            moderation_threshold: DEFAULT_MODERATION_THRESHOLD,
            category_cache_ttl: Duration::from_secs(300),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `ATELIE_API_URL` is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url("ATELIE_API_URL", &get_required_env("ATELIE_API_URL")?)?;
        let tenant_id = get_env_or_default("ATELIE_TENANT_ID", DEFAULT_TENANT_ID);
        let data_dir = PathBuf::from(get_env_or_default("ATELIE_DATA_DIR", ".atelie"));

        let moderation_threshold = get_env_or_default("ATELIE_MODERATION_THRESHOLD", "0.6")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ATELIE_MODERATION_THRESHOLD".to_string(), e.to_string())
            })?;
        validate_threshold(moderation_threshold, "ATELIE_MODERATION_THRESHOLD")?;

        let ttl_secs = get_env_or_default("ATELIE_CATEGORY_CACHE_TTL_SECS", "300")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "ATELIE_CATEGORY_CACHE_TTL_SECS".to_string(),
                    e.to_string(),
                )
            })?;

        Ok(Self {
            api_url,
            tenant_id,
            data_dir,
            moderation_threshold,
            category_cache_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a base URL, normalizing away a trailing slash.
pub(crate) fn parse_api_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn validate_threshold(value: f32, var_name: &str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("must be between 0 and 1 (got {value})"),
        ))
    }
}
