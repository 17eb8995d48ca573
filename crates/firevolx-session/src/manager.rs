//! Session manager for relay-brokered device sessions.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use firevolx_core::{ConnectTarget, ConnectionId, Message, Session, SessionStatus, TargetError};
use firevolx_transport::{
    ChannelConnector, ClientEvent, RelayEvent, TransportError,
    channel::{ChannelSender, Inbound},
};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, timeout, timeout_at},
};

use crate::{
    config::SessionConfig,
    subscriber::{HandlerSlots, MessageHandler},
};

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid connect target: {0}")]
    InvalidTarget(#[from] TargetError),
    #[error("Connection error: {0}")]
    ConnectFailure(String),
    #[error("Connection timeout")]
    Timeout,
    #[error("Connection error: {0}")]
    Channel(#[from] TransportError),
    #[error("Connection not active: {id} is {status}")]
    InvalidState { id: ConnectionId, status: SessionStatus },
    #[error("Session not found: {0}")]
    NotFound(ConnectionId),
    #[error("Disconnected before the connection completed: {0}")]
    Disconnected(ConnectionId),
}

type ConnectAck = oneshot::Sender<Result<(), SessionError>>;

/// One row of the session table.
struct SessionEntry {
    session: Session,
    outbound: Option<ChannelSender>,
    task: Option<JoinHandle<()>>,
}

impl SessionEntry {
    /// Move to `next` if the lifecycle allows it. Leaving the active states
    /// drops the outbound channel.
    fn advance(&mut self, next: SessionStatus) -> bool {
        if !self.session.status.can_transition_to(next) {
            return false;
        }
        self.session.status = next;
        if !next.is_active() {
            self.outbound = None;
        }
        true
    }
}

struct Inner {
    config: SessionConfig,
    connector: Arc<dyn ChannelConnector>,
    sessions: Mutex<HashMap<ConnectionId, SessionEntry>>,
    handlers: HandlerSlots,
}

/// Session manager.
///
/// Cheap to clone; clones share one session table. Every session owns one
/// channel to the relay, driven by its own task.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a session manager opening channels through `connector`.
    #[must_use]
    pub fn new(config: SessionConfig, connector: Arc<dyn ChannelConnector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                sessions: Mutex::new(HashMap::new()),
                handlers: HandlerSlots::new(),
            }),
        }
    }

    /// Connect to a device through the relay.
    ///
    /// Resolves once the relay acknowledges the device connection.
    ///
    /// # Errors
    /// Returns error if the target is invalid, the relay reports a failure, the
    /// channel fails, no acknowledgment arrives within the connect timeout, or
    /// the session is disconnected first.
    pub async fn connect(&self, target: ConnectTarget) -> Result<ConnectionId, SessionError> {
        self.start(target, None).await
    }

    /// Like [`connect`](Self::connect), with `handler` subscribed before the
    /// channel opens so it also sees connect-time messages.
    ///
    /// # Errors
    /// Same as [`connect`](Self::connect).
    pub async fn connect_with_handler(
        &self,
        target: ConnectTarget,
        handler: MessageHandler,
    ) -> Result<ConnectionId, SessionError> {
        self.start(target, Some(handler)).await
    }

    async fn start(
        &self,
        target: ConnectTarget,
        handler: Option<MessageHandler>,
    ) -> Result<ConnectionId, SessionError> {
        target.validate()?;

        let id = ConnectionId::generate();
        let mut session = Session::new(id.clone(), &target);
        session.status = SessionStatus::Connecting;
        let url = self.inner.config.relay.url_for(&target.host);
        tracing::info!(connection_id = %id, host = %session.host, port = session.port, %url, "Connecting");

        if let Some(handler) = handler {
            self.inner.handlers.set(id.clone(), handler);
        }
        self.inner.sessions().insert(
            id.clone(),
            SessionEntry {
                session,
                outbound: None,
                task: None,
            },
        );

        let (ack_tx, ack_rx) = oneshot::channel();
        let task = tokio::spawn(run_channel(
            Arc::clone(&self.inner),
            id.clone(),
            target,
            url,
            ack_tx,
        ));
        self.inner.attach_task(&id, task);

        match ack_rx.await {
            Ok(result) => result.map(|()| id),
            Err(_) => Err(SessionError::Disconnected(id)),
        }
    }

    /// Send a command to a connected session.
    ///
    /// Echoes the command to the subscriber as an input message, then forwards
    /// it to the relay. Does not wait for output. Nothing is echoed once the
    /// channel has closed.
    ///
    /// # Errors
    /// Returns error if the session is unknown, not connected, or its channel
    /// closed.
    pub fn send_command(&self, id: &ConnectionId, command: &str) -> Result<(), SessionError> {
        let (echo, outbound) = {
            let sessions = self.inner.sessions();
            let entry = sessions
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.clone()))?;
            let status = entry.session.status;
            let outbound = match (&entry.outbound, status) {
                (Some(outbound), SessionStatus::Connected) => outbound.clone(),
                _ => {
                    return Err(SessionError::InvalidState {
                        id: id.clone(),
                        status,
                    });
                }
            };
            let echo = format!(
                "{}@{}:~$ {command}",
                entry.session.username, self.inner.config.echo_host
            );
            (echo, outbound)
        };

        if outbound.is_closed() {
            return Err(SessionError::Channel(TransportError::Closed));
        }
        self.inner.handlers.deliver(id, &Message::input(echo));
        outbound.send(ClientEvent::command(command))?;
        tracing::debug!(connection_id = %id, %command, "Command sent");
        Ok(())
    }

    /// Close a session.
    ///
    /// A connecting or connected session is marked disconnected and its channel
    /// closed; a pending [`connect`](Self::connect) fails with
    /// [`SessionError::Disconnected`]. Unknown ids and finished sessions are left alone.
    pub fn disconnect(&self, id: &ConnectionId) {
        let closed = {
            let mut sessions = self.inner.sessions();
            match sessions.get_mut(id) {
                Some(entry) if entry.session.status.is_active() => {
                    if let Some(task) = entry.task.take() {
                        task.abort();
                    }
                    entry.advance(SessionStatus::Disconnected)
                }
                _ => false,
            }
        };

        if closed {
            tracing::info!(connection_id = %id, "Disconnected");
            self.inner.handlers.deliver(id, &Message::status("Disconnected"));
        }
    }

    /// Register the message handler for a session, replacing any previous one.
    pub fn subscribe(&self, id: &ConnectionId, handler: MessageHandler) {
        if self.inner.handlers.set(id.clone(), handler).is_some() {
            tracing::debug!(connection_id = %id, "Replaced message handler");
        }
    }

    /// Remove the message handler for a session.
    pub fn unsubscribe(&self, id: &ConnectionId) {
        self.inner.handlers.clear(id);
    }

    /// Snapshot of one session.
    #[must_use]
    pub fn get_connection(&self, id: &ConnectionId) -> Option<Session> {
        self.inner.sessions().get(id).map(|e| e.session.clone())
    }

    /// Snapshot of every session, oldest first.
    #[must_use]
    pub fn connections(&self) -> Vec<Session> {
        let mut sessions: Vec<_> = self
            .inner
            .sessions()
            .values()
            .map(|e| e.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Check whether the relay for `host` accepts a channel within the probe timeout.
    ///
    /// The probe channel is closed before returning. Without a host, a
    /// per-target relay is looked up on `localhost`.
    pub async fn test_connectivity(&self, host: Option<&str>) -> bool {
        let url = self
            .inner
            .config
            .relay
            .url_for(host.unwrap_or("localhost"));

        match timeout(self.inner.config.probe_timeout, self.inner.connector.open(&url)).await {
            Ok(Ok(channel)) => {
                drop(channel);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(%url, "Relay probe failed: {e}");
                false
            }
            Err(_) => {
                tracing::debug!(%url, "Relay probe timed out");
                false
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.inner.config)
            .field("sessions", &self.inner.sessions().len())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<ConnectionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep the channel task's handle so `disconnect` can stop it.
    fn attach_task(&self, id: &ConnectionId, task: JoinHandle<()>) {
        let mut sessions = self.sessions();
        match sessions.get_mut(id) {
            Some(entry) if entry.session.status.is_active() => entry.task = Some(task),
            Some(entry) if entry.session.status == SessionStatus::Disconnected => task.abort(),
            _ => {}
        }
    }

    /// Returns false if the session was cancelled while the channel opened.
    fn attach_outbound(&self, id: &ConnectionId, outbound: ChannelSender) -> bool {
        let mut sessions = self.sessions();
        match sessions.get_mut(id) {
            Some(entry) if entry.session.status == SessionStatus::Connecting => {
                entry.outbound = Some(outbound);
                true
            }
            _ => false,
        }
    }

    /// `connecting -> connected`. Returns false if the session moved on already.
    fn mark_connected(&self, id: &ConnectionId) -> bool {
        let address = {
            let mut sessions = self.sessions();
            let Some(entry) = sessions.get_mut(id) else {
                return false;
            };
            if !entry.advance(SessionStatus::Connected) {
                return false;
            }
            format!("{}:{}", entry.session.host, entry.session.port)
        };

        tracing::info!(connection_id = %id, %address, "Connected");
        self.handlers
            .deliver(id, &Message::status(format!("Connected to {address}")));
        true
    }

    /// `connecting -> error`, closing the channel.
    fn fail_connect(&self, id: &ConnectionId, error: &SessionError) {
        let failed = {
            let mut sessions = self.sessions();
            match sessions.get_mut(id) {
                Some(entry) if entry.session.status == SessionStatus::Connecting => {
                    entry.task = None;
                    entry.advance(SessionStatus::Error)
                }
                _ => false,
            }
        };

        if failed {
            tracing::warn!(connection_id = %id, "Connect failed: {error}");
            self.handlers.deliver(id, &Message::error(error.to_string()));
        }
    }

    /// `connected -> disconnected` after the channel or the device went away.
    fn close(&self, id: &ConnectionId) {
        let closed = {
            let mut sessions = self.sessions();
            match sessions.get_mut(id) {
                Some(entry) if entry.session.status == SessionStatus::Connected => {
                    entry.task = None;
                    entry.advance(SessionStatus::Disconnected)
                }
                _ => false,
            }
        };

        if closed {
            tracing::info!(connection_id = %id, "Connection closed");
            self.handlers.deliver(id, &Message::status("Connection closed"));
        }
    }

    /// Deliver a message while the session is still connected.
    fn emit(&self, id: &ConnectionId, message: &Message) {
        let connected = self
            .sessions()
            .get(id)
            .is_some_and(|e| e.session.status == SessionStatus::Connected);
        if connected {
            self.handlers.deliver(id, message);
        }
    }
}

/// Drive one session's channel from dial to close.
async fn run_channel(
    inner: Arc<Inner>,
    id: ConnectionId,
    target: ConnectTarget,
    url: String,
    ack: ConnectAck,
) {
    let deadline = Instant::now() + inner.config.connect_timeout;
    let dialed = timeout_at(deadline, dial(&inner, &id, target, &url))
        .await
        .unwrap_or(Err(SessionError::Timeout));

    let inbound = match dialed {
        Ok(inbound) => inbound,
        Err(e) => {
            inner.fail_connect(&id, &e);
            let _ = ack.send(Err(e));
            return;
        }
    };

    if !inner.mark_connected(&id) {
        return;
    }
    let _ = ack.send(Ok(()));

    pump(&inner, &id, inbound).await;
    inner.close(&id);
}

/// Open the channel, request the device connection and wait for the ack.
async fn dial(
    inner: &Inner,
    id: &ConnectionId,
    target: ConnectTarget,
    url: &str,
) -> Result<Inbound, SessionError> {
    let channel = inner.connector.open(url).await?;
    let (outbound, mut inbound) = channel.into_parts();
    outbound.send(ClientEvent::ConnectRequest(target))?;
    if !inner.attach_outbound(id, outbound) {
        return Err(SessionError::Disconnected(id.clone()));
    }

    loop {
        match inbound.recv().await {
            Some(Ok(RelayEvent::Connected { success: true, .. })) => return Ok(inbound),
            Some(Ok(RelayEvent::Connected {
                success: false,
                error,
            })) => {
                return Err(SessionError::ConnectFailure(
                    error.unwrap_or_else(|| "Connection failed".to_string()),
                ));
            }
            Some(Ok(RelayEvent::Error { message })) => {
                return Err(SessionError::ConnectFailure(message));
            }
            Some(Ok(RelayEvent::Disconnected)) => {
                return Err(SessionError::ConnectFailure(
                    "Device closed the connection".to_string(),
                ));
            }
            Some(Ok(RelayEvent::Data { .. })) => {}
            Some(Err(e)) => return Err(SessionError::Channel(e)),
            None => return Err(SessionError::Channel(TransportError::Closed)),
        }
    }
}

/// Republish relay events until the device or the channel closes.
async fn pump(inner: &Inner, id: &ConnectionId, mut inbound: Inbound) {
    while let Some(event) = inbound.recv().await {
        match event {
            Ok(event @ RelayEvent::Data { .. }) => {
                let message = match event.decode_data() {
                    Some(bytes) => Message::output(String::from_utf8_lossy(&bytes)),
                    None => Message::error("Malformed output from relay"),
                };
                inner.emit(id, &message);
            }
            Ok(RelayEvent::Error { message }) => {
                tracing::debug!(connection_id = %id, "Device error: {message}");
                inner.emit(id, &Message::error(message));
            }
            Ok(RelayEvent::Connected { .. }) => {
                tracing::debug!(connection_id = %id, "Ignoring stale acknowledgment");
            }
            Ok(RelayEvent::Disconnected) => break,
            Err(e) => {
                inner.emit(id, &Message::error(format!("Connection error: {e}")));
                break;
            }
        }
    }
}
