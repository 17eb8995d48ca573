//! Interactive Telnet client.

use std::{io, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::{Duration, Instant, timeout, timeout_at},
};

use super::negotiation::{TelnetDecoder, escape};
use crate::{
    prompt::{LOGIN_FAILED, LOGIN_PROMPT, PASSWORD_PROMPT, clean_exec_output},
    traits::{DeviceConnector, DeviceError, DeviceParams, DeviceSession},
};

/// Line terminator sent after commands and credentials.
const LINE_END: &[u8] = b"\r\n";

/// How much of the transcript tail is inspected for a prompt.
const PROMPT_WINDOW: usize = 1024;

type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Opens Telnet sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelnetConnector;

impl TelnetConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeviceConnector for TelnetConnector {
    async fn connect(&self, params: &DeviceParams) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let session = TelnetSession::connect(params).await?;
        Ok(Box::new(session))
    }
}

/// A logged-in Telnet session.
pub struct TelnetSession {
    writer: SharedWriter,
    output: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    reader: JoinHandle<()>,
    shell_prompt: Regex,
    exec_timeout: Duration,
    /// Tail of a timed-out command's output while its prompt is still due.
    unsynced: Option<Vec<u8>>,
}

impl TelnetSession {
    /// Connect to `params.host:params.port` and log in.
    ///
    /// # Errors
    /// Returns error if the TCP connect fails, the login is rejected, or the
    /// shell prompt does not appear within `params.connect_timeout`.
    pub async fn connect(params: &DeviceParams) -> Result<Self, DeviceError> {
        let deadline = Instant::now() + params.connect_timeout;
        tracing::debug!(address = %params.address(), "Opening Telnet connection");

        let stream = timeout_at(deadline, TcpStream::connect((params.host.as_str(), params.port)))
            .await
            .map_err(|_| DeviceError::Timeout("connection"))?
            .map_err(|e| DeviceError::ConnectionFailed(e.to_string()))?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&writer), tx));

        let mut session = Self {
            writer,
            output: rx,
            reader,
            shell_prompt: params.shell_prompt.clone(),
            exec_timeout: params.exec_timeout,
            unsynced: None,
        };

        timeout_at(
            deadline,
            session.login(&params.username, params.password.as_deref()),
        )
        .await
        .map_err(|_| DeviceError::Timeout("shell prompt"))??;

        tracing::info!(address = %params.address(), user = %params.username, "Telnet session ready");
        Ok(session)
    }

    async fn login(&mut self, username: &str, password: Option<&str>) -> Result<(), DeviceError> {
        let mut transcript = Vec::new();
        let mut sent_username = false;
        let mut sent_password = false;

        loop {
            let chunk = self.recv_chunk().await?;
            transcript.extend_from_slice(&chunk);
            let tail = prompt_window(&transcript);

            if (sent_username || sent_password) && LOGIN_FAILED.is_match(&tail) {
                return Err(DeviceError::Authentication("login incorrect".into()));
            }
            if LOGIN_PROMPT.is_match(&tail) {
                // A "Last login:" banner split mid-line looks like a prompt.
                if sent_username {
                    continue;
                }
                self.write_line(username.as_bytes()).await?;
                sent_username = true;
                transcript.clear();
            } else if PASSWORD_PROMPT.is_match(&tail) {
                if sent_password {
                    return Err(DeviceError::Authentication("password rejected".into()));
                }
                self.write_line(password.unwrap_or_default().as_bytes()).await?;
                sent_password = true;
                transcript.clear();
            } else if self.shell_prompt.is_match(&tail) {
                return Ok(());
            }
        }
    }

    async fn recv_chunk(&mut self) -> Result<Bytes, DeviceError> {
        match self.output.recv().await {
            Some(Ok(chunk)) => Ok(chunk),
            Some(Err(e)) => Err(DeviceError::Io(e)),
            None => Err(DeviceError::Closed),
        }
    }

    /// Discard a timed-out command's late output up to its prompt.
    async fn resync(&mut self) -> Result<(), DeviceError> {
        let mut stale = self.unsynced.take().unwrap_or_default();
        let drained = timeout(self.exec_timeout, async {
            while !self.shell_prompt.is_match(&prompt_window(&stale)) {
                let chunk = self.recv_chunk().await?;
                stale.extend_from_slice(&chunk);
            }
            Ok::<_, DeviceError>(())
        })
        .await;

        match drained {
            Ok(Ok(())) => {
                tracing::debug!(bytes = stale.len(), "Discarded late command output");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.unsynced = Some(keep_tail(stale));
                Err(DeviceError::Timeout("previous command"))
            }
        }
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), DeviceError> {
        let mut data = escape(line);
        data.extend_from_slice(LINE_END);
        let mut writer = self.writer.lock().await;
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for TelnetSession {
    async fn exec(&mut self, command: &str) -> Result<String, DeviceError> {
        if self.unsynced.is_some() {
            self.resync().await?;
        }
        self.write_line(command.as_bytes()).await?;

        let mut transcript = Vec::new();
        let collected = timeout(self.exec_timeout, async {
            loop {
                let chunk = self.recv_chunk().await?;
                transcript.extend_from_slice(&chunk);
                if self.shell_prompt.is_match(&prompt_window(&transcript)) {
                    return Ok::<_, DeviceError>(());
                }
            }
        })
        .await;

        match collected {
            Ok(Ok(())) => Ok(clean_exec_output(
                &String::from_utf8_lossy(&transcript),
                command,
                &self.shell_prompt,
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.unsynced = Some(keep_tail(transcript));
                Err(DeviceError::Timeout("command output"))
            }
        }
    }

    async fn next_output(&mut self) -> Option<Result<Bytes, DeviceError>> {
        let chunk = self.output.recv().await?.map_err(DeviceError::Io);
        // Late output read here still completes a timed-out command.
        if let (Ok(data), Some(stale)) = (&chunk, self.unsynced.as_mut()) {
            stale.extend_from_slice(data);
            if self.shell_prompt.is_match(&prompt_window(stale)) {
                self.unsynced = None;
            }
        }
        Some(chunk)
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        self.reader.abort();
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

impl Drop for TelnetSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn prompt_window(transcript: &[u8]) -> String {
    let start = transcript.len().saturating_sub(PROMPT_WINDOW);
    String::from_utf8_lossy(&transcript[start..]).into_owned()
}

fn keep_tail(mut transcript: Vec<u8>) -> Vec<u8> {
    let excess = transcript.len().saturating_sub(PROMPT_WINDOW);
    transcript.drain(..excess);
    transcript
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    writer: SharedWriter,
    tx: mpsc::UnboundedSender<io::Result<Bytes>>,
) {
    let mut decoder = TelnetDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Telnet peer closed the connection");
                break;
            }
            Ok(n) => {
                let decoded = decoder.decode(&buf[..n]);
                if !decoded.replies.is_empty() {
                    if let Err(e) = writer.lock().await.write_all(&decoded.replies).await {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
                if !decoded.data.is_empty() && tx.send(Ok(Bytes::from(decoded.data))).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Telnet read error: {e}");
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}
