//! Connection targets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port assumed for the remote-shell protocol when a target omits one.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Target validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("Target host is required")]
    MissingHost,
    #[error("Target username is required")]
    MissingUsername,
}

/// Device address and credentials for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectTarget {
    /// Hostname or IP address of the device.
    pub host: String,
    /// Remote-shell port; `None` means [`DEFAULT_TELNET_PORT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Login name on the device.
    pub username: String,
    /// Login password, if the device asks for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConnectTarget {
    /// Create a target on the default port without a password.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: None,
        }
    }

    /// Set an explicit port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Port to dial, falling back to [`DEFAULT_TELNET_PORT`].
    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_TELNET_PORT)
    }

    /// Check that host and username are present.
    ///
    /// # Errors
    /// Returns error if either field is empty or whitespace.
    pub fn validate(&self) -> Result<(), TargetError> {
        if self.host.trim().is_empty() {
            return Err(TargetError::MissingHost);
        }
        if self.username.trim().is_empty() {
            return Err(TargetError::MissingUsername);
        }
        Ok(())
    }
}
