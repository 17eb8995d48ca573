//! Simulated robot shell.
//!
//! Only used when the relay is explicitly started in simulated mode or by
//! tests; it is never a fallback for a failed Telnet connection.

use async_trait::async_trait;
use bytes::Bytes;

use crate::traits::{DeviceConnector, DeviceError, DeviceParams, DeviceSession};

/// Connector producing canned ROS 2 robot shells.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    failure: Option<String>,
}

impl SimulatedConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose every connect attempt fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl DeviceConnector for SimulatedConnector {
    async fn connect(&self, params: &DeviceParams) -> Result<Box<dyn DeviceSession>, DeviceError> {
        if let Some(message) = &self.failure {
            return Err(DeviceError::ConnectionFailed(message.clone()));
        }
        tracing::info!(address = %params.address(), "Opening simulated device session");
        Ok(Box::new(SimulatedSession {
            username: params.username.clone(),
            closed: false,
        }))
    }
}

/// One simulated shell.
#[derive(Debug)]
pub struct SimulatedSession {
    username: String,
    closed: bool,
}

impl SimulatedSession {
    fn respond(&self, command: &str) -> String {
        let command = command.trim();
        let response = match command.to_lowercase().as_str() {
            "ros2 node list" => "/fire_detection_node\n/camera_publisher\n/alert_system\n/patrol_controller",
            "ros2 topic list" => "/fire_alert\n/camera_stream\n/robot_status\n/emergency_stop\n/patrol_waypoints",
            "ros2 topic echo /fire_alert" => "data: Fire detected in sector A3\ntimestamp: 1703764800\nseverity: HIGH",
            "ros2 service list" => "/emergency_stop\n/set_patrol_route\n/configure_sensors\n/get_robot_status",
            "systemctl status ros2-firevolx" => "● ros2-firevolx.service - Firevolx Detection System\n   Loaded: loaded\n   Active: active (running)",
            "ls" => "firevolx_ws  logs  config  scripts",
            "pwd" => return format!("/home/{}", self.username),
            "whoami" => return self.username.clone(),
            "help" => "Available ROS 2 commands:\n- ros2 node list\n- ros2 topic list\n- ros2 topic echo /topic_name\n- ros2 service list\n- systemctl status ros2-firevolx",
            _ if command.starts_with("ros2") => "Command executed. Check robot logs for details.",
            _ => return format!("bash: {command}: command not found"),
        };
        response.to_string()
    }
}

#[async_trait]
impl DeviceSession for SimulatedSession {
    async fn exec(&mut self, command: &str) -> Result<String, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(self.respond(command))
    }

    async fn next_output(&mut self) -> Option<Result<Bytes, DeviceError>> {
        if self.closed {
            return None;
        }
        // A simulated shell never speaks unprompted.
        std::future::pending().await
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    fn params() -> DeviceParams {
        DeviceParams::new("10.0.0.5", 23, "pi")
    }

    #[tokio::test]
    async fn test_canned_responses() {
        let mut session = SimulatedConnector::new().connect(&params()).await.unwrap();
        assert_eq!(session.exec("whoami").await.unwrap(), "pi");
        assert_eq!(session.exec("pwd").await.unwrap(), "/home/pi");
        assert!(session.exec("ros2 node list").await.unwrap().contains("/fire_detection_node"));
        assert_eq!(
            session.exec("frobnicate").await.unwrap(),
            "bash: frobnicate: command not found"
        );
    }

    #[tokio::test]
    async fn test_closed_session() {
        let mut session = SimulatedConnector::new().connect(&params()).await.unwrap();
        assert_ok!(session.end().await);
        assert!(session.next_output().await.is_none());
        assert!(matches!(session.exec("ls").await, Err(DeviceError::Closed)));
    }

    #[tokio::test]
    async fn test_failing_connector() {
        let result = SimulatedConnector::failing("no route to host")
            .connect(&params())
            .await;
        assert!(matches!(result, Err(DeviceError::ConnectionFailed(m)) if m == "no route to host"));
    }
}
