//! Relay service: one device connection per client channel.

use std::{collections::HashMap, sync::Arc};

use firevolx_core::{ConnectTarget, TargetError};
use firevolx_device::{DeviceConnector, DeviceError, DeviceSession};
use firevolx_transport::{ClientEvent, RelayEvent};
use thiserror::Error;
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::config::RelayConfig;

/// Identity of one accepted client channel.
pub type ChannelId = Uuid;

/// Where a channel's relay events go.
pub type EventSink = mpsc::UnboundedSender<RelayEvent>;

/// Relay error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Handle to a channel's device actor.
struct DeviceHandle {
    /// Distinguishes this actor from a later one on the same channel.
    token: Uuid,
    commands: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

type DeviceTable = RwLock<HashMap<ChannelId, DeviceHandle>>;

/// Relay service.
///
/// Owns the device table. Cheap to clone.
#[derive(Clone)]
pub struct RelayService {
    connector: Arc<dyn DeviceConnector>,
    config: Arc<RelayConfig>,
    devices: Arc<DeviceTable>,
}

impl RelayService {
    /// Create a relay reaching devices through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn DeviceConnector>, config: RelayConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of channels that own a device connection.
    pub async fn active_connections(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Whether `channel` owns a device connection.
    pub async fn has_device(&self, channel: ChannelId) -> bool {
        self.devices.read().await.contains_key(&channel)
    }

    /// Apply one client event received on `channel`.
    pub async fn handle_event(&self, channel: ChannelId, event: ClientEvent, events: &EventSink) {
        match event {
            ClientEvent::ConnectRequest(target) => {
                self.connect_device(channel, &target, events).await;
            }
            ClientEvent::Command { command } => self.command(channel, command).await,
        }
    }

    /// Open the device connection for `channel`.
    ///
    /// Emits `connected` on success and `error` on failure. A channel that
    /// already owns a device gets an `error` and keeps its device.
    pub async fn connect_device(&self, channel: ChannelId, target: &ConnectTarget, events: &EventSink) {
        if self.has_device(channel).await {
            let _ = events.send(RelayEvent::error(
                "A device connection is already open on this channel",
            ));
            return;
        }
        if let Err(e) = target.validate() {
            let _ = events.send(RelayEvent::error(e.to_string()));
            return;
        }

        let params = self.config.device_params(target);
        tracing::info!(channel_id = %channel, address = %params.address(), user = %params.username, "Connecting to device");

        let session = match self.connector.connect(&params).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(channel_id = %channel, address = %params.address(), "Device connection failed: {e}");
                let _ = events.send(RelayEvent::error(e.to_string()));
                return;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let token = Uuid::new_v4();

        // Hold the table while spawning so the actor cannot remove itself first.
        let mut devices = self.devices.write().await;
        let _ = events.send(RelayEvent::connected());
        let task = tokio::spawn(run_device(
            Arc::clone(&self.devices),
            channel,
            token,
            session,
            rx,
            events.clone(),
        ));
        devices.insert(
            channel,
            DeviceHandle {
                token,
                commands: tx,
                task,
            },
        );
    }

    /// Queue a command for the channel's device. Ignored without a device.
    pub async fn command(&self, channel: ChannelId, command: String) {
        match self.devices.read().await.get(&channel) {
            Some(handle) => {
                let _ = handle.commands.send(command);
            }
            None => tracing::debug!(channel_id = %channel, "Ignoring command without a device"),
        }
    }

    /// Tear down the channel's device connection.
    pub async fn release(&self, channel: ChannelId) {
        let handle = self.devices.write().await.remove(&channel);
        if let Some(handle) = handle {
            // Closing the queue lets the actor end the session after any running command.
            drop(handle.commands);
            tracing::info!(channel_id = %channel, "Released device connection");
        }
    }

    /// Stop every device actor.
    pub async fn shutdown(&self) {
        for (channel, handle) in self.devices.write().await.drain() {
            handle.task.abort();
            tracing::debug!(channel_id = %channel, "Aborted device actor");
        }
    }

    /// Log in to a device, run `whoami` and disconnect.
    ///
    /// # Errors
    /// Returns error if the target is invalid or the device connection or
    /// command fails.
    pub async fn test_connection(&self, target: &ConnectTarget) -> Result<String, RelayError> {
        target.validate()?;
        let params = self.config.test_params(target);

        let mut session = self.connector.connect(&params).await?;
        let result = session.exec("whoami").await;
        if let Err(e) = session.end().await {
            tracing::debug!(address = %params.address(), "Failed to close test connection: {e}");
        }
        Ok(result?.trim().to_string())
    }
}

impl std::fmt::Debug for RelayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Serialize commands to one device and forward its output.
async fn run_device(
    devices: Arc<DeviceTable>,
    channel: ChannelId,
    token: Uuid,
    mut session: Box<dyn DeviceSession>,
    mut commands: mpsc::UnboundedReceiver<String>,
    events: EventSink,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    if let Err(e) = session.end().await {
                        tracing::debug!(channel_id = %channel, "Failed to close device: {e}");
                    }
                    return;
                };
                match session.exec(&command).await {
                    Ok(output) => {
                        let _ = events.send(RelayEvent::data(output.as_bytes()));
                    }
                    Err(DeviceError::Closed) => {
                        let _ = events.send(RelayEvent::Disconnected);
                        break;
                    }
                    Err(e) if e.is_fatal() => {
                        let _ = events.send(RelayEvent::error(e.to_string()));
                        let _ = events.send(RelayEvent::Disconnected);
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(channel_id = %channel, %command, "Command failed: {e}");
                        let _ = events.send(RelayEvent::error(e.to_string()));
                    }
                }
            }
            output = session.next_output() => match output {
                Some(Ok(chunk)) => {
                    let _ = events.send(RelayEvent::data(&chunk));
                }
                Some(Err(e)) => {
                    let _ = events.send(RelayEvent::error(e.to_string()));
                    let _ = events.send(RelayEvent::Disconnected);
                    break;
                }
                None => {
                    let _ = events.send(RelayEvent::Disconnected);
                    break;
                }
            },
        }
    }

    tracing::info!(channel_id = %channel, "Device connection closed");
    let mut devices = devices.write().await;
    if devices.get(&channel).is_some_and(|h| h.token == token) {
        devices.remove(&channel);
    }
}
