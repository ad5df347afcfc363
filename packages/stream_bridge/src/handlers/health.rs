use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::metrics::HealthStatus;
use crate::server::AppState;

/// Health check endpoint - bridge status plus a metrics snapshot
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let metrics = state.metrics.snapshot();
    match state.engine.fetch_streams().await {
        Ok(streams) => Json(HealthStatus {
            status: "healthy".to_string(),
            streams: streams.len(),
            metrics,
        })
        .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable".to_string(),
                streams: 0,
                metrics,
            }),
        )
            .into_response(),
    }
}
