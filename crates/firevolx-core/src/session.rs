//! Client-side session model.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConnectTarget;

/// Opaque identifier of a logical session.
///
/// Generated ids look like `telnet-1703764800000-3f9a1c2b7`: creation time in
/// Unix milliseconds followed by a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("telnet-{}-{}", unix_millis(), &suffix[..9]))
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Session status.
///
/// Moves forward only: `Disconnected -> Connecting -> Connected`, then to
/// `Disconnected` or `Error`. A connect that never completes ends in `Error`,
/// or in `Disconnected` when the caller cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    /// Whether moving from `self` to `next` respects the lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected | Self::Error)
                | (Self::Connected, Self::Disconnected | Self::Error)
        )
    }

    /// Whether a channel may still be attached.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique connection id.
    pub id: ConnectionId,
    /// Target device host.
    pub host: String,
    /// Target device port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password. Kept in memory only.
    #[serde(skip)]
    pub password: Option<String>,
    /// Current status.
    pub status: SessionStatus,
    /// Creation timestamp (Unix epoch milliseconds).
    pub created_at: i64,
}

impl Session {
    /// Create a session record in `Disconnected` state for a target.
    #[must_use]
    pub fn new(id: ConnectionId, target: &ConnectTarget) -> Self {
        Self {
            id,
            host: target.host.clone(),
            port: target.port_or_default(),
            username: target.username.clone(),
            password: target.password.clone(),
            status: SessionStatus::Disconnected,
            created_at: unix_millis(),
        }
    }
}

pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("telnet-"));
        assert_eq!(a.as_str().rsplit('-').next().map(str::len), Some(9));
    }

    #[test]
    fn test_status_is_monotonic() {
        use SessionStatus::*;

        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Error.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_password_not_serialized() {
        let target = ConnectTarget::new("10.0.0.5", "pi").with_password("raspberry");
        let session = Session::new(ConnectionId::from("telnet-1-abc"), &target);
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("raspberry"));
        assert_eq!(session.port, 23);
    }
}
