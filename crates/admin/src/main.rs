//! Ateliê Admin - shipping settings service.
//!
//! Serves the Melhor Envio settings API on port 3001 and persists through
//! the shop backend's provider-config endpoint.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use atelie_admin::backend::HttpProviderConfigStore;
use atelie_admin::config::AdminConfig;
use atelie_admin::routes;
use atelie_admin::state::AppState;
use axum::Router;
use axum::http::{Request, Response};
use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::{Level, Span};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "atelie_admin=info,tower_http=debug";

fn init_sentry(config: &AdminConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.sentry_environment.clone().map(Into::into),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Warnings and errors become Sentry events, info and debug breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        Level::TRACE => EventFilter::Ignore,
    }
}

/// JSON logs on Fly.io, text locally.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let on_fly = std::env::var("FLY_APP_NAME").is_ok();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(on_fly.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true)))
        .with((!on_fly).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

fn app(store: HttpProviderConfigStore) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                status = tracing::field::Empty,
                latency_ms = tracing::field::Empty,
            )
        })
        .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
            span.record("status", response.status().as_u16());
            span.record("latency_ms", u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
            DefaultOnResponse::default().on_response(response, latency, span);
        });

    routes::routes()
        .layer(trace)
        .with_state(AppState::new(store))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[tokio::main]
async fn main() {
    let config = AdminConfig::from_env().expect("Failed to load configuration");
    // Sentry must be up before the subscriber that forwards to it.
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let store = HttpProviderConfigStore::new(&config).expect("Failed to create backend client");
    tracing::info!(?store, tenant = %config.tenant_id, "provider config store ready");

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!("admin listening on http://{addr}");

    axum::serve(listener, app(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
