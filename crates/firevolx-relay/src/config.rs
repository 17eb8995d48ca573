//! Relay configuration.

use std::time::Duration;

use firevolx_core::ConnectTarget;
use firevolx_device::{DeviceParams, prompt::default_shell_prompt};
use regex::Regex;

/// Device connection settings applied to every channel.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Matches the tail of device output once the shell is idle.
    pub shell_prompt: Regex,
    /// Bound on TCP connect plus login.
    pub connect_timeout: Duration,
    /// Bound on one command returning to the prompt.
    pub exec_timeout: Duration,
    /// Bound on each step of `/test-connection`.
    pub test_timeout: Duration,
}

impl RelayConfig {
    /// Parameters for a channel's long-lived device connection.
    #[must_use]
    pub fn device_params(&self, target: &ConnectTarget) -> DeviceParams {
        self.params(target, self.connect_timeout, self.exec_timeout)
    }

    /// Parameters for a short-lived connectivity test.
    #[must_use]
    pub fn test_params(&self, target: &ConnectTarget) -> DeviceParams {
        self.params(target, self.test_timeout, self.test_timeout)
    }

    fn params(&self, target: &ConnectTarget, connect: Duration, exec: Duration) -> DeviceParams {
        DeviceParams::new(&target.host, target.port_or_default(), &target.username)
            .with_password(target.password.clone())
            .with_shell_prompt(self.shell_prompt.clone())
            .with_timeouts(connect, exec)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            shell_prompt: default_shell_prompt(),
            connect_timeout: Duration::from_secs(10),
            exec_timeout: Duration::from_secs(10),
            test_timeout: Duration::from_secs(5),
        }
    }
}
