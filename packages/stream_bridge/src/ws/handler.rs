//! WebSocket Handler
//!
//! One task pair per connection: a writer draining the client's outbound
//! channel and a reader forwarding text frames to the engine.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::clients::{ClientSocket, OUTBOUND_QUEUE_CAPACITY};
use super::protocol::ClientId;
use crate::engine::{EngineCommand, EngineHandle};

/// Serve one WebSocket connection until it closes.
///
/// Without a client id the connection is accepted but never registered; it
/// is read until the peer goes away and nothing is ever sent to it.
pub async fn handle_client_socket(
    socket: WebSocket,
    client_id: Option<ClientId>,
    engine: EngineHandle,
) {
    let Some(client_id) = client_id.filter(|id| !id.is_empty()) else {
        debug!("connection without uuid, leaving it inert");
        drain_inert(socket).await;
        return;
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

    let client = ClientSocket::new(tx);
    let seq = client.seq();
    let liveness = client.liveness();

    if engine
        .post(EngineCommand::ClientConnected {
            client_id: client_id.clone(),
            socket: client,
        })
        .is_err()
    {
        return;
    }

    // Ends when the engine drops the client's socket or the peer stops reading
    let sender_liveness = liveness.clone();
    let sender_task = async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                sender_liveness.mark_dead();
                break;
            }
        }
        let _ = ws_sender.close().await;
    };

    let input_engine = engine.clone();
    let input_id = client_id.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let cmd = EngineCommand::ClientMessage {
                        client_id: input_id.clone(),
                        seq,
                        text: text.as_str().to_owned(),
                    };
                    if input_engine.post(cmd).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(client_id = %input_id, error = %e, "receive failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(client_id = %client_id, "sender task ended"),
        _ = input_task => debug!(client_id = %client_id, "input task ended"),
    }

    liveness.mark_dead();
    let _ = engine.post(EngineCommand::ClientDisconnected { client_id, seq });
}

async fn drain_inert(mut socket: WebSocket) {
    while let Some(msg) = socket.recv().await {
        if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }
}
