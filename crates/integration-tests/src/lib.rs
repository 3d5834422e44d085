//! Integration tests for Ateliê.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelie-integration-tests
//! ```
//!
//! No external services are needed: [`FakeBackend`] stands in for the shop
//! backend on an ephemeral port, storing the Melhor Envio configuration the
//! admin service saves and pricing storefront quotes with it.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use atelie_core::shipping::{
    CarrierQuote, MelhorEnvioConfig, RouteContext, ShippingOffer, apply_free_shipping,
};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::RwLock;

/// Admin token the fake backend accepts.
pub const ADMIN_TOKEN: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6";

/// Tenant the fake backend expects.
pub const TENANT_ID: &str = "atelie-aruanda";

/// Path of the Melhor Envio provider config, relative to the API root.
pub const PROVIDER_CONFIG_PATH: &str = "/admin/provider-configs/MELHOR_ENVIO";

/// Serve `router` on an ephemeral port.
///
/// # Errors
///
/// Returns an error if no local port can be bound.
pub async fn serve(router: Router) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "test server stopped");
        }
    });
    Ok(addr)
}

/// Region of a CEP, by its leading digits.
#[must_use]
pub fn uf_for_cep(cep: &str) -> Option<&'static str> {
    let prefix: u32 = cep.get(..2)?.parse().ok()?;
    match prefix {
        1..=19 => Some("SP"),
        20..=28 => Some("RJ"),
        29 => Some("ES"),
        30..=39 => Some("MG"),
        40..=48 => Some("BA"),
        80..=87 => Some("PR"),
        90..=99 => Some("RS"),
        _ => None,
    }
}

struct BackendState {
    config_json: RwLock<Option<String>>,
    saves: AtomicUsize,
    carrier_quotes: Vec<CarrierQuote>,
    quote_requests: RwLock<Vec<Value>>,
}

/// In-process stand-in for the shop backend.
#[derive(Clone)]
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start a backend whose carriers answer every quote with `carrier_quotes`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start(carrier_quotes: Vec<CarrierQuote>) -> std::io::Result<Self> {
        let state = Arc::new(BackendState {
            config_json: RwLock::new(None),
            saves: AtomicUsize::new(0),
            carrier_quotes,
            quote_requests: RwLock::new(Vec::new()),
        });
        let router = Router::new()
            .route(
                &format!("/api{PROVIDER_CONFIG_PATH}"),
                get(load_config).put(save_config),
            )
            .route("/api/shipping/quote", post(quote))
            .with_state(Arc::clone(&state));

        let addr = serve(router).await?;
        Ok(Self { addr, state })
    }

    /// API root, e.g. `http://127.0.0.1:4000/api`.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Store `config` as if an earlier admin session had saved it.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` cannot be serialized.
    pub async fn seed(&self, config: &MelhorEnvioConfig) -> serde_json::Result<()> {
        *self.state.config_json.write().await = Some(serde_json::to_string(config)?);
        Ok(())
    }

    /// Configuration currently stored, if any.
    pub async fn stored(&self) -> Option<MelhorEnvioConfig> {
        let json = self.state.config_json.read().await.clone()?;
        serde_json::from_str(&json).ok()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.state.saves.load(Ordering::SeqCst)
    }

    /// Bodies of every `/shipping/quote` request received.
    pub async fn quote_requests(&self) -> Vec<Value> {
        self.state.quote_requests.read().await.clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("authorization") == Some(format!("Bearer {ADMIN_TOKEN}").as_str())
        && header("x-tenant-id") == Some(TENANT_ID)
}

async fn load_config(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.config_json.read().await.clone() {
        Some(config_json) => Json(json!({ "configJson": config_json })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn save_config(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(record): Json<Value>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let Some(config_json) = record.get("configJson").and_then(Value::as_str) else {
        return StatusCode::BAD_REQUEST;
    };
    *state.config_json.write().await = Some(config_json.to_string());
    state.saves.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn quote(State(state): State<Arc<BackendState>>, Json(request): Json<Value>) -> Json<Value> {
    let region = request
        .get("cep")
        .and_then(Value::as_str)
        .and_then(uf_for_cep);
    let subtotal: Decimal = request
        .get("subtotal")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    state.quote_requests.write().await.push(request);

    let config: MelhorEnvioConfig = state
        .config_json
        .read()
        .await
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();
    let offers: Vec<ShippingOffer> = apply_free_shipping(
        state.carrier_quotes.clone(),
        &config,
        &RouteContext::new(region, subtotal),
    );
    Json(json!({ "options": offers }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uf_for_cep() {
        assert_eq!(uf_for_cep("01001000"), Some("SP"));
        assert_eq!(uf_for_cep("20040002"), Some("RJ"));
        assert_eq!(uf_for_cep("90010000"), Some("RS"));
        assert_eq!(uf_for_cep("7"), None);
        assert_eq!(uf_for_cep("ab123"), None);
    }
}
