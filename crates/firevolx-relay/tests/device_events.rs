//! Device-side events reaching the client channel.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use firevolx_core::ConnectTarget;
use firevolx_device::{DeviceConnector, DeviceError, DeviceParams, DeviceSession};
use firevolx_relay::{RelayConfig, RelayService};
use firevolx_transport::{ClientEvent, RelayEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

type Feed = mpsc::UnboundedSender<Result<Bytes, DeviceError>>;

/// Connector handing out one session whose unsolicited output the test drives.
struct ScriptedConnector {
    output: Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, DeviceError>>>>,
}

struct ScriptedSession {
    output: mpsc::UnboundedReceiver<Result<Bytes, DeviceError>>,
}

#[async_trait]
impl DeviceConnector for ScriptedConnector {
    async fn connect(&self, _params: &DeviceParams) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let output = self
            .output
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DeviceError::ConnectionFailed("already used".into()))?;
        Ok(Box::new(ScriptedSession { output }))
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn exec(&mut self, command: &str) -> Result<String, DeviceError> {
        match command {
            "sleep" => Err(DeviceError::Timeout("command output")),
            "exit" => Err(DeviceError::Closed),
            other => Ok(format!("ran {other}")),
        }
    }

    async fn next_output(&mut self) -> Option<Result<Bytes, DeviceError>> {
        self.output.recv().await
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

async fn connected() -> (RelayService, Uuid, Feed, mpsc::UnboundedReceiver<RelayEvent>) {
    let (feed, output) = mpsc::unbounded_channel();
    let connector = ScriptedConnector {
        output: Mutex::new(Some(output)),
    };
    let service = RelayService::new(Arc::new(connector), RelayConfig::default());
    let channel = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service
        .handle_event(
            channel,
            ClientEvent::ConnectRequest(ConnectTarget::new("10.0.0.5", "pi")),
            &tx,
        )
        .await;
    assert_eq!(rx.recv().await, Some(RelayEvent::connected()));
    (service, channel, feed, rx)
}

async fn wait_until_released(service: &RelayService) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while service.active_connections().await > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("device entry was not removed");
}

#[tokio::test]
async fn unsolicited_output_is_forwarded() {
    let (_service, _channel, feed, mut rx) = connected().await;

    feed.send(Ok(Bytes::from_static(b"Broadcast: fire drill"))).unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.decode_data().unwrap(), b"Broadcast: fire drill");
}

#[tokio::test]
async fn command_timeout_keeps_device() {
    let (service, channel, _feed, mut rx) = connected().await;

    service.command(channel, "sleep".into()).await;
    assert_eq!(
        rx.recv().await,
        Some(RelayEvent::error("Timed out waiting for command output"))
    );

    service.command(channel, "uptime".into()).await;
    assert_eq!(rx.recv().await.unwrap().decode_data().unwrap(), b"ran uptime");
    assert_eq!(service.active_connections().await, 1);
}

#[tokio::test]
async fn device_close_disconnects_channel() {
    let (service, _channel, feed, mut rx) = connected().await;

    drop(feed);

    assert_eq!(rx.recv().await, Some(RelayEvent::Disconnected));
    wait_until_released(&service).await;
}

#[tokio::test]
async fn device_read_error_reports_then_disconnects() {
    let (service, _channel, feed, mut rx) = connected().await;

    feed.send(Err(DeviceError::Io(std::io::Error::other("reset"))))
        .unwrap();

    assert!(matches!(rx.recv().await, Some(RelayEvent::Error { .. })));
    assert_eq!(rx.recv().await, Some(RelayEvent::Disconnected));
    wait_until_released(&service).await;
}

#[tokio::test]
async fn closed_during_command_disconnects() {
    let (service, channel, _feed, mut rx) = connected().await;

    service.command(channel, "exit".into()).await;

    assert_eq!(rx.recv().await, Some(RelayEvent::Disconnected));
    wait_until_released(&service).await;
}
