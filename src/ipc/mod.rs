// IPC module - Control channel to the supervisor

pub mod client;
pub mod protocol;

pub use client::IpcClient;
pub use protocol::{Command, Request, Response, ResponseData, StatsReply, StatsStatus};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Operations the plugins consume from the supervisor
///
/// Every call may suspend; a transport failure or timeout is reported as an
/// error and callers treat it like an error status.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Names of every watcher managed by the supervisor
    async fn list(&self) -> Result<Vec<String>>;

    /// Selected options of one watcher
    async fn get(&self, name: &str, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Current resource usage of one watcher's processes
    async fn stats(&self, name: &str) -> Result<StatsReply>;

    async fn restart(&self, name: &str) -> Result<()>;

    async fn reload(&self, name: &str) -> Result<()>;

    /// Deliver `signum` to a single process of watcher `name`
    async fn signal(&self, name: &str, pid: u32, signum: i32) -> Result<()>;
}
