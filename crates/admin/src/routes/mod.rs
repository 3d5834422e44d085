//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                             - Health check
//!
//! # Melhor Envio shipping settings
//! GET   /api/shipping/melhor-envio          - Editor view (token masked)
//! PUT   /api/shipping/melhor-envio          - Replace with an editor draft
//! PATCH /api/shipping/melhor-envio          - Apply editor commands
//! POST  /api/shipping/melhor-envio/preview  - Encode a draft without saving
//! POST  /api/shipping/melhor-envio/evaluate - Free-shipping check for a destination
//! ```

use axum::{Router, routing::get};

use crate::backend::ProviderConfigStore;
use crate::state::AppState;

pub mod shipping;

/// Build the admin router.
pub fn routes<S: ProviderConfigStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .merge(shipping::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::backend::InMemoryProviderConfigStore;

    #[tokio::test]
    async fn test_health() {
        let app = routes().with_state(AppState::new(InMemoryProviderConfigStore::default()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
