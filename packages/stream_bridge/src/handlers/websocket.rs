use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;

use crate::server::AppState;
use crate::ws;

/// Query string of the WebSocket endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Client session id; without it the connection stays inert
    pub uuid: Option<String>,
}

pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let engine = state.engine.clone();
    ws.on_upgrade(move |socket| ws::handle_client_socket(socket, params.uuid, engine))
}
