//! Client for the shop's REST backend.
//!
//! Every request carries the `X-Tenant-ID` header and, while a session is
//! active, an `Authorization: Bearer` token. A 401 on anything but the login
//! endpoint ends the local session.
//!
//! Endpoint groups live in submodules and are methods on [`ApiClient`].

mod account;
mod catalog;
mod orders;
mod payments;
mod subscriptions;
pub mod types;

pub use orders::QuoteLine;
pub use payments::{CardData, CardToken, CardTokenizer, Identification, PublicKeyResponse};
pub use types::*;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::session::SessionStore;

/// Header naming the tenant on every request.
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Requests to this path may fail with 401 without ending the session.
const LOGIN_PATH: &str = "/auth/login";

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or rejected credentials.
    #[error("Unauthorized")]
    Unauthorized,
}

/// Backend API client.
///
/// Cheap to clone; clones share the HTTP connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    tenant_id: String,
    session: SessionStore,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig, session: SessionStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                tenant_id: config.tenant_id.clone(),
                session,
            }),
        })
    }

    /// Backend base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Session whose token authenticates requests.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Public URL of an uploaded media file.
    #[must_use]
    pub fn public_media_url(&self, id: atelie_core::MediaId) -> String {
        format!("{}/media/public/{id}", self.inner.base_url)
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(TENANT_HEADER, &self.inner.tenant_id);
        match self.inner.session.token().await {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, path).await;
        self.send(path, builder).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, path).await.query(query);
        self.send(path, builder).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::POST, path).await.json(body);
        self.send(path, builder).await
    }

    /// POST ignoring the response body.
    pub(crate) async fn post_unit<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, path).await.json(body);
        self.send_unit(path, builder).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::POST, path).await.multipart(form);
        self.send(path, builder).await
    }

    /// PATCH ignoring the response body.
    pub(crate) async fn patch_unit<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let builder = self.request(Method::PATCH, path).await.json(body);
        self.send_unit(path, builder).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::PUT, path).await.json(body);
        self.send(path, builder).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, path).await;
        self.send_unit(path, builder).await
    }

    pub(crate) async fn delete_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, path).await.query(query);
        self.send_unit(path, builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Parse(format!("Failed to parse response from {path}: {e}")));
        }

        Err(self.parse_error(path, response).await)
    }

    async fn send_unit(&self, path: &str, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.parse_error(path, response).await)
    }

    /// Map an error response, ending the session on an unexpected 401.
    async fn parse_error(&self, path: &str, response: reqwest::Response) -> ApiError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return ApiError::RateLimited(retry_after);
        }

        if status == StatusCode::UNAUTHORIZED {
            if !path.starts_with(LOGIN_PATH) && self.inner.session.is_authenticated().await {
                tracing::warn!(path, "session rejected by backend, logging out");
                if let Err(e) = self.inner.session.clear().await {
                    tracing::error!(error = %e, "failed to clear rejected session");
                }
            }
            return ApiError::Unauthorized;
        }

        if status == StatusCode::FORBIDDEN {
            return ApiError::Unauthorized;
        }

        if status == StatusCode::NOT_FOUND {
            return ApiError::NotFound(path.to_string());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        ApiError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        }
    }
}

/// Pull `message` or `error` out of a JSON error body, else use the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key)?.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("tenant_id", &self.inner.tenant_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;

    use super::*;
    use crate::events::{EventBus, StoreEvent};
    use crate::storage::LocalStorage;

    /// Serve `router` on an ephemeral port.
    pub(crate) async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    pub(crate) async fn client_for(
        addr: SocketAddr,
        dir: &std::path::Path,
        events: EventBus,
    ) -> ApiClient {
        let session = SessionStore::load(LocalStorage::new(dir), events).await;
        let config = StorefrontConfig::new(format!("http://{addr}/api").parse().unwrap());
        ApiClient::new(&config, session).unwrap()
    }

    async fn echo_headers(headers: HeaderMap) -> axum::Json<serde_json::Value> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        axum::Json(serde_json::json!({
            "tenant": get("x-tenant-id"),
            "auth": get("authorization"),
        }))
    }

    #[tokio::test]
    async fn test_sends_tenant_and_bearer() {
        let addr = serve(Router::new().route("/api/echo", get(echo_headers))).await;
        let dir = tempfile::tempdir().unwrap();
        let api = client_for(addr, dir.path(), EventBus::new()).await;

        let body: serde_json::Value = api.get("/echo").await.unwrap();
        assert_eq!(body["tenant"], "atelie-aruanda");
        assert!(body["auth"].is_null());

        api.session()
            .set_session("tok-123".into(), user())
            .await
            .unwrap();
        let body: serde_json::Value = api.get("/echo").await.unwrap();
        assert_eq!(body["auth"], "Bearer tok-123");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let router = Router::new()
            .route("/api/orders/x", get(|| async { StatusCode::UNAUTHORIZED }))
            .route("/api/auth/login", get(|| async { StatusCode::UNAUTHORIZED }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let api = client_for(addr, dir.path(), events).await;
        api.session().set_session("tok".into(), user()).await.unwrap();

        let err = api.get::<serde_json::Value>("/auth/login").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(api.session().is_authenticated().await);

        let err = api.get::<serde_json::Value>("/orders/x").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!api.session().is_authenticated().await);
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::AuthChanged);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let router = Router::new()
            .route("/api/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/api/busy",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "7")]) }),
            )
            .route(
                "/api/broken",
                get(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        axum::Json(serde_json::json!({"message": "CEP inválido"})),
                    )
                }),
            );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let api = client_for(addr, dir.path(), EventBus::new()).await;

        assert!(matches!(
            api.get::<serde_json::Value>("/missing").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.get::<serde_json::Value>("/busy").await,
            Err(ApiError::RateLimited(7))
        ));
        match api.get::<serde_json::Value>("/broken").await {
            Err(ApiError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "CEP inválido");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(r#"{"error":"x"}"#), "x");
        assert_eq!(error_message("plain"), "plain");
    }

    pub(crate) fn user() -> User {
        User {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap(),
            name: "Maria".into(),
            email: "maria@example.com".into(),
            role: None,
            email_verified: true,
            photo_url: None,
            google_id: None,
            document: None,
        }
    }
}
