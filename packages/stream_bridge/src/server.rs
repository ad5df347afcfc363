//! HTTP surface: the WebSocket endpoint plus the thin app-hosting routes.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::warn;
use uuid::Uuid;

use crate::config::FieldConfig;
use crate::engine::EngineHandle;
use crate::handlers;
use crate::metrics::BridgeMetrics;

/// Paths the router owns; an app route may not shadow them.
const RESERVED_ROUTES: &[&str] = &["ws", "health", "settings.json"];

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub metrics: Arc<BridgeMetrics>,
    pub settings: Arc<Value>,
    pub default_app: Option<String>,
}

/// State of the metadata form listener
#[derive(Clone)]
pub struct MetadataState {
    pub fields: Arc<BTreeMap<String, FieldConfig>>,
    /// Submissions waiting for the next pipeline tick
    pub queue: mpsc::Sender<Map<String, Value>>,
}

/// Span maker that stamps every request with a fresh request id.
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// Build the router. `apps` maps an app name to its resolved directory.
pub fn router(state: AppState, apps: &BTreeMap<String, PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/ws", get(handlers::websocket_handler))
        .route("/settings.json", get(handlers::settings_handler))
        .route("/health", get(handlers::health_handler));

    for (name, dir) in apps {
        if !is_mountable(name) {
            warn!(app = %name, "skipping app route with a reserved or invalid name");
            continue;
        }
        let serve = Router::<()>::new()
            .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
            .layer(middleware::from_fn(handlers::app_trailing_slash));
        app = app.nest_service(&format!("/{}", name), serve);
    }

    app.layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router for the metadata form: the page at `/` and JSON submissions at
/// `/submit`.
pub fn metadata_router(state: MetadataState) -> Router {
    Router::new()
        .route("/", get(handlers::metadata_form))
        .route("/submit", post(handlers::submit_metadata))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

fn is_mountable(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !RESERVED_ROUTES.contains(&name)
}
