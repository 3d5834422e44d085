//! Persistence of the Melhor Envio provider configuration.
//!
//! The backend stores provider settings as a JSON string under
//! `/admin/provider-configs/MELHOR_ENVIO`:
//!
//! ```json
//! { "configJson": "{\"token\":\"...\",\"rules\":{...}}", "environment": "PRODUCTION" }
//! ```
//!
//! Handlers talk to a [`ProviderConfigStore`] so tests can run against
//! [`InMemoryProviderConfigStore`].

use std::future::Future;
use std::sync::Arc;

use atelie_core::shipping::MelhorEnvioConfig;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::config::AdminConfig;

/// Provider code of Melhor Envio in the backend.
pub const PROVIDER_CODE: &str = "MELHOR_ENVIO";

const TENANT_HEADER: &str = "X-Tenant-ID";
const ENVIRONMENT: &str = "PRODUCTION";

/// Errors that can occur when reading or writing provider configuration.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Admin token rejected.
    #[error("Unauthorized: invalid admin token")]
    Unauthorized,

    /// Stored configuration is not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Storage for the Melhor Envio configuration.
pub trait ProviderConfigStore: Send + Sync {
    /// Current configuration. A provider that was never configured yields the
    /// empty configuration.
    fn load(&self) -> impl Future<Output = Result<MelhorEnvioConfig, BackendError>> + Send;

    /// Replace the stored configuration.
    fn save(&self, config: &MelhorEnvioConfig) -> impl Future<Output = Result<(), BackendError>> + Send;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderConfigRecord {
    #[serde(default)]
    config_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
}

// =============================================================================
// HTTP store
// =============================================================================

/// Provider configuration stored by the shop backend.
#[derive(Clone)]
pub struct HttpProviderConfigStore {
    inner: Arc<HttpStoreInner>,
}

struct HttpStoreInner {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpProviderConfigStore {
    /// Create a store from admin configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the token is not
    /// a valid header value.
    pub fn new(config: &AdminConfig) -> Result<Self, BackendError> {
        Self::with_endpoint(
            &format!(
                "{}/admin/provider-configs/{PROVIDER_CODE}",
                config.api_url.as_str().trim_end_matches('/')
            ),
            &config.admin_token,
            &config.tenant_id,
        )
    }

    /// Create a store for an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the token is not
    /// a valid header value.
    pub fn with_endpoint(
        endpoint: &str,
        admin_token: &SecretString,
        tenant_id: &str,
    ) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", admin_token.expose_secret()))
            .map_err(|e| BackendError::Parse(format!("Invalid admin token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            TENANT_HEADER,
            HeaderValue::from_str(tenant_id)
                .map_err(|e| BackendError::Parse(format!("Invalid tenant id: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpStoreInner {
                client,
                endpoint: endpoint.to_string(),
            }),
        })
    }

    /// Parse error response from the backend.
    async fn parse_error(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return BackendError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return BackendError::Unauthorized;
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        BackendError::Api { status, message }
    }
}

impl ProviderConfigStore for HttpProviderConfigStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<MelhorEnvioConfig, BackendError> {
        let response = self.inner.client.get(&self.inner.endpoint).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!("provider not configured yet");
            return Ok(MelhorEnvioConfig::default());
        }
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        let record: ProviderConfigRecord = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("Failed to parse response: {e}")))?;

        if record.config_json.trim().is_empty() {
            return Ok(MelhorEnvioConfig::default());
        }
        serde_json::from_str(&record.config_json)
            .map_err(|e| BackendError::Parse(format!("Invalid configJson: {e}")))
    }

    #[instrument(skip(self, config))]
    async fn save(&self, config: &MelhorEnvioConfig) -> Result<(), BackendError> {
        let record = ProviderConfigRecord {
            config_json: serde_json::to_string(config)
                .map_err(|e| BackendError::Parse(e.to_string()))?,
            environment: Some(ENVIRONMENT.to_string()),
        };

        let response = self
            .inner
            .client
            .put(&self.inner.endpoint)
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }
        tracing::info!("provider config saved");
        Ok(())
    }
}

impl std::fmt::Debug for HttpProviderConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfigStore")
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store, used in tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderConfigStore {
    config: Arc<RwLock<MelhorEnvioConfig>>,
}

impl InMemoryProviderConfigStore {
    #[must_use]
    pub fn new(config: MelhorEnvioConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Stored configuration, unmasked.
    pub async fn snapshot(&self) -> MelhorEnvioConfig {
        self.config.read().await.clone()
    }
}

impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn load(&self) -> Result<MelhorEnvioConfig, BackendError> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, config: &MelhorEnvioConfig) -> Result<(), BackendError> {
        *self.config.write().await = config.clone();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use atelie_core::shipping::RuleMap;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::get;

    use super::*;

    type Saved = Arc<RwLock<Option<(String, ProviderConfigRecord)>>>;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn store(addr: SocketAddr, path: &str) -> HttpProviderConfigStore {
        HttpProviderConfigStore::with_endpoint(
            &format!("http://{addr}{path}"),
            &SecretString::from("aB3xY9mK2nL5pQ7rT0uW4zC6"),
            "atelie-aruanda",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_parses_config_json() {
        let router = Router::new().route(
            "/cfg",
            get(|| async {
                axum::Json(serde_json::json!({
                    "configJson": r#"{"zipCode":"01001000","rules":{"SP":"region == 'SP'"}}"#
                }))
            }),
        );
        let addr = serve(router).await;

        let config = store(addr, "/cfg").load().await.unwrap();
        assert_eq!(config.zip_code.as_deref(), Some("01001000"));
        assert_eq!(config.decoded_rules().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_provider_loads_empty() {
        let addr = serve(Router::new()).await;
        let config = store(addr, "/cfg").load().await.unwrap();
        assert_eq!(config, MelhorEnvioConfig::default());
    }

    #[tokio::test]
    async fn test_save_sends_record_with_credentials() {
        let saved: Saved = Arc::default();
        let router = Router::new()
            .route(
                "/cfg",
                get(|| async { StatusCode::NOT_FOUND }).put(
                    |State(saved): State<Saved>,
                     headers: AxumHeaders,
                     axum::Json(record): axum::Json<ProviderConfigRecord>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        *saved.write().await = Some((auth, record));
                        StatusCode::OK
                    },
                ),
            )
            .with_state(Arc::clone(&saved));
        let addr = serve(router).await;

        let config = MelhorEnvioConfig {
            rules: Some(RuleMap::from_iter([("Sul", "region == 'RS'")])),
            ..Default::default()
        };
        store(addr, "/cfg").save(&config).await.unwrap();

        let guard = saved.read().await;
        let (auth, record) = guard.as_ref().unwrap();
        assert_eq!(auth, "Bearer aB3xY9mK2nL5pQ7rT0uW4zC6");
        assert_eq!(record.environment.as_deref(), Some("PRODUCTION"));
        let stored: MelhorEnvioConfig = serde_json::from_str(&record.config_json).unwrap();
        assert_eq!(stored, config);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let router = Router::new()
            .route("/denied", get(|| async { StatusCode::FORBIDDEN }))
            .route("/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
            .route("/garbage", get(|| async { axum::Json(serde_json::json!({"configJson": "{"})) }));
        let addr = serve(router).await;

        assert!(matches!(
            store(addr, "/denied").load().await,
            Err(BackendError::Unauthorized)
        ));
        match store(addr, "/broken").load().await {
            Err(BackendError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            store(addr, "/garbage").load().await,
            Err(BackendError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryProviderConfigStore::default();
        let config = MelhorEnvioConfig {
            token: Some("tok".into()),
            ..Default::default()
        };
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }
}
