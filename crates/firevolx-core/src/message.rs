//! Typed messages delivered to session subscribers.

use serde::{Deserialize, Serialize};

use crate::session::unix_millis;

/// Kind of a session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Connection lifecycle narration.
    Status,
    /// Text received from the device.
    Output,
    /// Echo of a command the caller sent.
    Input,
    /// Failure narration.
    Error,
}

/// One event for a session subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: String,
    /// Capture time (Unix epoch milliseconds).
    pub timestamp: i64,
}

impl Message {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(kind: MessageKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            timestamp: unix_millis(),
        }
    }

    #[must_use]
    pub fn status(data: impl Into<String>) -> Self {
        Self::new(MessageKind::Status, data)
    }

    #[must_use]
    pub fn output(data: impl Into<String>) -> Self {
        Self::new(MessageKind::Output, data)
    }

    #[must_use]
    pub fn input(data: impl Into<String>) -> Self {
        Self::new(MessageKind::Input, data)
    }

    #[must_use]
    pub fn error(data: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, data)
    }
}
