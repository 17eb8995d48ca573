//! WebSocket endpoint: one client channel per socket.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use firevolx_transport::{ClientEvent, RelayEvent};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::service::RelayService;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(service): State<RelayService>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: RelayService) {
    let (mut sender, mut receiver) = socket.split();
    let channel = Uuid::new_v4();
    tracing::info!(channel_id = %channel, "Client connected");

    // Channel for sending events to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<RelayEvent>();

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(channel_id = %channel, "WebSocket error: {e}");
                break;
            }
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(channel_id = %channel, "Invalid client message: {e}");
                let _ = tx.send(RelayEvent::error(format!("Invalid message: {e}")));
                continue;
            }
        };

        service.handle_event(channel, event, &tx).await;
    }

    // Cleanup
    service.release(channel).await;
    send_task.abort();
    tracing::info!(channel_id = %channel, "Client disconnected");
}
