//! WebSocket channels to the relay.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    channel::{Channel, ChannelConnector, TransportError},
    protocol::{ClientEvent, RelayEvent},
};

/// Opens one WebSocket per channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn open(&self, url: &str) -> Result<Channel, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(%url, "WebSocket channel open");

        let (mut sender, mut receiver) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        // Forward client events until the channel owner drops its sender.
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
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
            let _ = sender.close().await;
        });

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = receiver.next() => msg,
                    () = in_tx.closed() => break,
                };
                let text = match msg {
                    Some(Ok(Message::Text(t))) => t.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(s) => s,
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = in_tx.send(Err(TransportError::WebSocket(e.to_string())));
                        break;
                    }
                };

                match serde_json::from_str::<RelayEvent>(&text) {
                    Ok(event) => {
                        if in_tx.send(Ok(event)).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Invalid relay message: {e}"),
                }
            }
        });

        Ok(Channel::new(out_tx, in_rx))
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;
    use firevolx_core::ConnectTarget;

    /// Relay stand-in that acknowledges a connect request with one data chunk.
    async fn spawn_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let event: ClientEvent = serde_json::from_str(text.as_str()).unwrap();
                if let ClientEvent::ConnectRequest(target) = event {
                    for reply in [RelayEvent::connected(), RelayEvent::data(target.username.as_bytes())] {
                        let json = serde_json::to_string(&reply).unwrap();
                        ws.send(Message::Text(json.into())).await.unwrap();
                    }
                }
            }
        });

        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn test_websocket_roundtrip() {
        let url = spawn_relay().await;
        let channel = WsConnector::new().open(&url).await.unwrap();
        let (outbound, mut inbound) = channel.into_parts();

        outbound
            .send(ClientEvent::ConnectRequest(ConnectTarget::new("10.0.0.5", "pi")))
            .unwrap();

        assert_eq!(inbound.recv().await, Some(Ok(RelayEvent::connected())));
        let data = inbound.recv().await.unwrap().unwrap();
        assert_eq!(data.decode_data().unwrap(), b"pi");
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector::new().open(&format!("ws://{addr}/ws")).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
