//! Telnet client against a scripted loopback server.

use std::time::Duration;

use firevolx_device::{DeviceConnector, DeviceError, DeviceParams, TelnetConnector};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const IAC: u8 = 0xFF;
const DO: u8 = 0xFD;
const WILL: u8 = 0xFB;
const PROMPT: &str = "pi@raspberrypi:~ $ ";

/// Read one CRLF-terminated line, skipping the client's negotiation replies.
async fn read_line(stream: &mut TcpStream) -> Option<String> {
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await.ok()?;
        if byte == IAC {
            let mut rest = [0u8; 2];
            stream.read_exact(&mut rest).await.ok()?;
            continue;
        }
        line.push(byte);
        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

async fn write(stream: &mut TcpStream, data: &str) {
    stream.write_all(data.as_bytes()).await.unwrap();
}

/// A Raspberry Pi-like Telnet server accepting `pi` / `raspberry`.
async fn spawn_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                stream.write_all(&[IAC, DO, 24, IAC, WILL, 1]).await.unwrap();
                write(&mut stream, "Raspbian GNU/Linux 12\r\nraspberrypi login: ").await;
                let Some(user) = read_line(&mut stream).await else { return };
                write(&mut stream, "Password: ").await;
                let Some(password) = read_line(&mut stream).await else { return };

                if user != "pi" || password != "raspberry" {
                    write(&mut stream, "\r\nLogin incorrect\r\nraspberrypi login: ").await;
                    let _ = read_line(&mut stream).await;
                    return;
                }
                write(&mut stream, &format!("\r\nLast login: Mon Oct 12\r\n{PROMPT}")).await;

                while let Some(command) = read_line(&mut stream).await {
                    let output = match command.as_str() {
                        "whoami" => "pi\r\n".to_string(),
                        "ros2 node list" => "/fire_detection_node\r\n/camera_publisher\r\n".to_string(),
                        "alert" => {
                            write(&mut stream, &format!("{command}\r\n{PROMPT}")).await;
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            write(&mut stream, "Broadcast: fire drill at 10:00\r\n").await;
                            continue;
                        }
                        "slow" => {
                            tokio::time::sleep(Duration::from_millis(400)).await;
                            "slow-result\r\n".to_string()
                        }
                        "hang" => {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            return;
                        }
                        "exit" => return,
                        other => format!("bash: {other}: command not found\r\n"),
                    };
                    write(&mut stream, &format!("{command}\r\n{output}{PROMPT}")).await;
                }
            });
        }
    });

    port
}

fn params(port: u16, password: &str) -> DeviceParams {
    DeviceParams::new("127.0.0.1", port, "pi")
        .with_password(Some(password.to_string()))
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
}

#[tokio::test]
async fn test_login_and_exec() {
    let port = spawn_server().await;
    let mut session = TelnetConnector::new()
        .connect(&params(port, "raspberry"))
        .await
        .unwrap();

    assert_eq!(session.exec("whoami").await.unwrap(), "pi");
    assert_eq!(
        session.exec("ros2 node list").await.unwrap(),
        "/fire_detection_node\n/camera_publisher"
    );
    assert_eq!(
        session.exec("reboot-now").await.unwrap(),
        "bash: reboot-now: command not found"
    );

    session.end().await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let port = spawn_server().await;
    let result = TelnetConnector::new().connect(&params(port, "hunter2")).await;
    assert!(matches!(result, Err(DeviceError::Authentication(_))));
}

#[tokio::test]
async fn test_unsolicited_output_and_close() {
    let port = spawn_server().await;
    let mut session = TelnetConnector::new()
        .connect(&params(port, "raspberry"))
        .await
        .unwrap();

    assert_eq!(session.exec("alert").await.unwrap(), "");

    let chunk = session.next_output().await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&chunk).contains("fire drill"));

    // The server hangs up instead of answering.
    assert!(matches!(session.exec("exit").await, Err(DeviceError::Closed)));
    assert!(session.next_output().await.is_none());
}

/// Login with the normal budget, commands with a 250 ms one.
fn impatient_params(port: u16) -> DeviceParams {
    DeviceParams::new("127.0.0.1", port, "pi")
        .with_password(Some("raspberry".to_string()))
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(250))
}

#[tokio::test]
async fn test_command_after_timeout_gets_its_own_output() {
    let port = spawn_server().await;
    let mut session = TelnetConnector::new()
        .connect(&impatient_params(port))
        .await
        .unwrap();

    assert!(matches!(
        session.exec("slow").await,
        Err(DeviceError::Timeout(_))
    ));
    // The late "slow-result" is skipped, not returned for whoami.
    assert_eq!(session.exec("whoami").await.unwrap(), "pi");
    assert_eq!(session.exec("whoami").await.unwrap(), "pi");
}

#[tokio::test]
async fn test_late_output_read_between_commands() {
    let port = spawn_server().await;
    let mut session = TelnetConnector::new()
        .connect(&impatient_params(port))
        .await
        .unwrap();

    assert!(session.exec("slow").await.is_err());

    let mut late = String::new();
    while !late.contains(PROMPT) {
        let chunk = session.next_output().await.unwrap().unwrap();
        late.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(late.contains("slow-result"));

    assert_eq!(session.exec("whoami").await.unwrap(), "pi");
}

#[tokio::test]
async fn test_busy_device_keeps_reporting_timeouts() {
    let port = spawn_server().await;
    let mut session = TelnetConnector::new()
        .connect(&impatient_params(port))
        .await
        .unwrap();

    assert!(matches!(
        session.exec("hang").await,
        Err(DeviceError::Timeout("command output"))
    ));
    assert!(matches!(
        session.exec("whoami").await,
        Err(DeviceError::Timeout("previous command"))
    ));
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let params = DeviceParams::new("127.0.0.1", port, "pi")
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    let result = TelnetConnector::new().connect(&params).await;
    assert!(matches!(result, Err(DeviceError::Timeout(_))));
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = TelnetConnector::new().connect(&params(port, "raspberry")).await;
    assert!(matches!(result, Err(DeviceError::ConnectionFailed(_))));
}
