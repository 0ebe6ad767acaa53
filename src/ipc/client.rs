// IPC Client - Talks to the supervisor via its Unix socket

use crate::config::DEFAULT_SOCKET_PATH;
use crate::error::{Result, WatchError};
use crate::ipc::{Command, Request, Response, ResponseData, StatsReply, Supervisor};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

/// Maximum number of connection retry attempts
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default bound for one request/response exchange
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// IPC client for the supervisor control channel
pub struct IpcClient {
    socket_path: PathBuf,
    timeout: Duration,
    request_id: AtomicU64,
}

impl IpcClient {
    /// Create a new IPC client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(DEFAULT_SOCKET_PATH)
    }

    /// Create a new IPC client with a custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
            request_id: AtomicU64::new(1),
        }
    }

    /// Bound every request/response exchange by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a command to the supervisor and wait for its response
    pub async fn send_command(&self, command: Command) -> Result<Response> {
        let request_id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(request_id, command);

        let mut last_error = None;
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            match self.try_send_request(&request).await {
                Ok(response) => {
                    if response.id != request_id {
                        return Err(WatchError::ProtocolError(format!(
                            "Response ID mismatch: expected {}, got {}",
                            request_id, response.id
                        )));
                    }
                    return Ok(response);
                }
                // Only a failed connect is worth retrying; the request may
                // already have been applied otherwise.
                Err(e @ WatchError::ConnectionError(_)) => {
                    debug!(
                        "{} attempt {}/{} failed: {}",
                        request.command.verb(),
                        attempt,
                        MAX_RETRY_ATTEMPTS,
                        e
                    );
                    last_error = Some(e);
                    if attempt < MAX_RETRY_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            WatchError::ConnectionError("Failed to connect after retries".to_string())
        }))
    }

    async fn try_send_request(&self, request: &Request) -> Result<Response> {
        let verb = request.command.verb();
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                WatchError::TimeoutError(format!(
                    "{} did not complete within {:?}",
                    verb, self.timeout
                ))
            })?
    }

    /// Single request/response exchange over a fresh connection
    async fn exchange(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect().await?;

        let mut request_json = serde_json::to_string(request).map_err(|e| {
            WatchError::SerializationError(format!("Failed to serialize request: {}", e))
        })?;
        request_json.push('\n');

        stream
            .write_all(request_json.as_bytes())
            .await
            .map_err(|e| WatchError::IpcError(format!("Failed to write request: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| WatchError::IpcError(format!("Failed to flush stream: {}", e)))?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        let read = reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| WatchError::IpcError(format!("Failed to read response: {}", e)))?;
        if read == 0 {
            return Err(WatchError::IpcError(
                "Supervisor closed the connection without responding".to_string(),
            ));
        }

        serde_json::from_str(&response_line).map_err(|e| {
            WatchError::DeserializationError(format!("Failed to deserialize response: {}", e))
        })
    }

    async fn connect(&self) -> Result<UnixStream> {
        if !self.socket_path.exists() {
            return Err(WatchError::SupervisorNotRunning);
        }

        UnixStream::connect(&self.socket_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchError::SupervisorNotRunning
            } else {
                WatchError::ConnectionError(format!("Failed to connect to supervisor: {}", e))
            }
        })
    }

    /// Send a command and unwrap the supervisor's verdict
    async fn call(&self, command: Command) -> Result<ResponseData> {
        self.send_command(command)
            .await?
            .result
            .map_err(WatchError::SupervisorError)
    }

    async fn call_ack(&self, command: Command) -> Result<()> {
        let verb = command.verb();
        match self.call(command).await? {
            ResponseData::Success(_) => Ok(()),
            other => Err(unexpected(verb, &other)),
        }
    }

    /// Get the socket path being used
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(verb: &str, data: &ResponseData) -> WatchError {
    WatchError::ProtocolError(format!("Unexpected reply to {}: {:?}", verb, data))
}

#[async_trait]
impl Supervisor for IpcClient {
    async fn list(&self) -> Result<Vec<String>> {
        match self.call(Command::List).await? {
            ResponseData::Watchers(names) => Ok(names),
            other => Err(unexpected("list", &other)),
        }
    }

    async fn get(&self, name: &str, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let command = Command::Get {
            name: name.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        };
        match self.call(command).await? {
            ResponseData::Options(options) => Ok(options),
            other => Err(unexpected("get", &other)),
        }
    }

    async fn stats(&self, name: &str) -> Result<StatsReply> {
        let command = Command::Stats {
            name: name.to_string(),
        };
        match self.call(command).await? {
            ResponseData::Stats(reply) => Ok(reply),
            other => Err(unexpected("stats", &other)),
        }
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.call_ack(Command::Restart {
            name: name.to_string(),
        })
        .await
    }

    async fn reload(&self, name: &str) -> Result<()> {
        self.call_ack(Command::Reload {
            name: name.to_string(),
        })
        .await
    }

    async fn signal(&self, name: &str, pid: u32, signum: i32) -> Result<()> {
        self.call_ack(Command::Signal {
            name: name.to_string(),
            pid,
            signum,
        })
        .await
    }
}
