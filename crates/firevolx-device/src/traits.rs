//! Device connection traits.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use thiserror::Error;

use crate::prompt::default_shell_prompt;

/// Default time allowed for connecting and logging in.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for one command to return to the prompt.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Device error.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection closed")]
    Closed,
    #[error("Invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl DeviceError {
    /// Whether the connection is unusable after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed)
    }
}

/// Parameters for one device connection.
#[derive(Debug, Clone)]
pub struct DeviceParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    /// Pattern that matches the tail of the output once the shell is idle.
    pub shell_prompt: Regex,
    /// Bound on TCP connect plus login.
    pub connect_timeout: Duration,
    /// Bound on a single command.
    pub exec_timeout: Duration,
}

impl DeviceParams {
    /// Create parameters with the default prompt pattern and timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            shell_prompt: default_shell_prompt(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_shell_prompt(mut self, shell_prompt: Regex) -> Self {
        self.shell_prompt = shell_prompt;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, exec: Duration) -> Self {
        self.connect_timeout = connect;
        self.exec_timeout = exec;
        self
    }

    /// `host:port` for logging.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens device connections.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Connect and log in.
    async fn connect(&self, params: &DeviceParams) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

/// A live, logged-in device connection.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run a command and return its output once the shell prompt comes back.
    ///
    /// The echoed command line and the trailing prompt are not part of the result.
    async fn exec(&mut self, command: &str) -> Result<String, DeviceError>;

    /// Next chunk the device produced outside of [`exec`](Self::exec).
    ///
    /// Returns `None` once the device closed the connection. Cancel-safe.
    async fn next_output(&mut self) -> Option<Result<Bytes, DeviceError>>;

    /// Close the connection.
    async fn end(&mut self) -> Result<(), DeviceError>;
}
