//! Wire protocol for session manager to relay communication.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use firevolx_core::ConnectTarget;
use serde::{Deserialize, Serialize};

/// Event from the session manager to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open a device connection for this channel.
    ConnectRequest(ConnectTarget),
    /// Run a command on the channel's device.
    Command { command: String },
}

impl ClientEvent {
    /// Create a command event.
    #[must_use]
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
        }
    }
}

/// Event from the relay to the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Outcome of a connect request.
    Connected {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Device output (base64 encoded).
    Data { data: String },
    /// Device-side or relay-side failure.
    Error { message: String },
    /// Device connection closed.
    Disconnected,
}

impl RelayEvent {
    /// Successful connect acknowledgment.
    #[must_use]
    pub const fn connected() -> Self {
        Self::Connected {
            success: true,
            error: None,
        }
    }

    /// Create an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create a data event from raw bytes.
    #[must_use]
    pub fn data(data: &[u8]) -> Self {
        Self::Data {
            data: BASE64.encode(data),
        }
    }

    /// Decode data from base64.
    #[must_use]
    pub fn decode_data(&self) -> Option<Vec<u8>> {
        if let Self::Data { data } = self {
            BASE64.decode(data).ok()
        } else {
            None
        }
    }
}
