//! Session manager configuration.

use std::time::Duration;

/// Port the relay listens on when it runs next to the device.
pub const DEFAULT_RELAY_PORT: u16 = 8081;

/// Where the relay for a target is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEndpoint {
    /// One relay serves every target.
    Fixed(String),
    /// A relay runs on each target host: `ws://<host>:<port><path>`.
    PerTarget { port: u16, path: String },
}

impl RelayEndpoint {
    /// Relay URL for a target host.
    #[must_use]
    pub fn url_for(&self, host: &str) -> String {
        match self {
            Self::Fixed(url) => url.clone(),
            Self::PerTarget { port, path } => format!("ws://{host}:{port}{path}"),
        }
    }
}

impl Default for RelayEndpoint {
    fn default() -> Self {
        Self::PerTarget {
            port: DEFAULT_RELAY_PORT,
            path: "/ws".to_string(),
        }
    }
}

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub relay: RelayEndpoint,
    /// Bound on opening the channel plus the relay's acknowledgment.
    pub connect_timeout: Duration,
    /// Bound on the connectivity probe handshake.
    pub probe_timeout: Duration,
    /// Host name shown in echoed input lines.
    pub echo_host: String,
}

impl SessionConfig {
    /// Configuration for a single relay at `url`.
    #[must_use]
    pub fn with_relay_url(url: impl Into<String>) -> Self {
        Self {
            relay: RelayEndpoint::Fixed(url.into()),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay: RelayEndpoint::default(),
            connect_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            echo_host: "raspberrypi".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_urls() {
        assert_eq!(
            RelayEndpoint::default().url_for("10.0.0.5"),
            "ws://10.0.0.5:8081/ws"
        );
        let fixed = RelayEndpoint::Fixed("ws://relay.local:9000/ws".into());
        assert_eq!(fixed.url_for("10.0.0.5"), "ws://relay.local:9000/ws");
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.echo_host, "raspberrypi");

        let config = SessionConfig::with_relay_url("ws://127.0.0.1:8081/ws");
        assert_eq!(config.relay, RelayEndpoint::Fixed("ws://127.0.0.1:8081/ws".into()));
    }
}
