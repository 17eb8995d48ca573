//! Message-framed channels to the relay.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::{ClientEvent, RelayEvent};

/// Transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to reach relay at {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Invalid relay message: {0}")]
    Protocol(String),
    #[error("Channel closed")]
    Closed,
}

/// Inbound half: relay events, or a channel failure right before the end.
pub type Inbound = mpsc::UnboundedReceiver<Result<RelayEvent, TransportError>>;

/// Outbound half of a channel.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSender {
    /// Queue an event for the relay.
    ///
    /// # Errors
    /// Returns error if the channel is closed.
    pub fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.tx.send(event).map_err(|_| TransportError::Closed)
    }

    /// Whether the channel task stopped reading.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An open channel to the relay.
///
/// Dropping the outbound half closes the channel.
#[derive(Debug)]
pub struct Channel {
    outbound: ChannelSender,
    inbound: Inbound,
}

impl Channel {
    /// Assemble a channel from its two halves.
    #[must_use]
    pub const fn new(outbound: mpsc::UnboundedSender<ClientEvent>, inbound: Inbound) -> Self {
        Self {
            outbound: ChannelSender { tx: outbound },
            inbound,
        }
    }

    /// Create an in-memory channel.
    ///
    /// Returns the channel and the relay's end of it.
    #[must_use]
    pub fn pair() -> (Self, RelayEnd) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        (
            Self::new(client_tx, relay_rx),
            RelayEnd {
                events: client_rx,
                replies: relay_tx,
            },
        )
    }

    /// Split into outbound and inbound halves.
    #[must_use]
    pub fn into_parts(self) -> (ChannelSender, Inbound) {
        (self.outbound, self.inbound)
    }
}

/// Relay side of an in-memory channel.
#[derive(Debug)]
pub struct RelayEnd {
    events: mpsc::UnboundedReceiver<ClientEvent>,
    replies: mpsc::UnboundedSender<Result<RelayEvent, TransportError>>,
}

impl RelayEnd {
    /// Receive the next client event; `None` once the client closed the channel.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.events.try_recv().ok()
    }

    /// Send an event to the client.
    ///
    /// # Errors
    /// Returns error if the client dropped the channel.
    pub fn send(&self, event: RelayEvent) -> Result<(), TransportError> {
        self.replies.send(Ok(event)).map_err(|_| TransportError::Closed)
    }

    /// Report a channel failure to the client.
    ///
    /// # Errors
    /// Returns error if the client dropped the channel.
    pub fn fail(&self, error: TransportError) -> Result<(), TransportError> {
        self.replies.send(Err(error)).map_err(|_| TransportError::Closed)
    }

    /// Whether the client dropped its outbound half.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.replies.is_closed()
    }
}

/// Opens channels to a relay.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open a channel and complete the handshake.
    async fn open(&self, url: &str) -> Result<Channel, TransportError>;
}
