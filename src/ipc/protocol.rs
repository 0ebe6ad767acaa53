// Control channel wire types shared with the supervisor

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Status reported by the supervisor for a stats request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsStatus {
    Ok,
    Error,
}

/// Reply to a `stats` request
///
/// `info` maps process ids (as strings) to per-process records. The
/// supervisor may add non-record entries, which are ignored when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReply {
    pub status: StatsStatus,
    #[serde(default)]
    pub info: HashMap<String, Value>,
}

impl StatsReply {
    pub fn ok(info: HashMap<String, Value>) -> Self {
        Self {
            status: StatsStatus::Ok,
            info,
        }
    }

    pub fn error() -> Self {
        Self {
            status: StatsStatus::Error,
            info: HashMap::new(),
        }
    }
}

/// Commands understood by the supervisor control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    List,
    Get { name: String, keys: Vec<String> },
    Stats { name: String },
    Restart { name: String },
    Reload { name: String },
    Signal { name: String, pid: u32, signum: i32 },
}

impl Command {
    /// Short name used in logs
    pub fn verb(&self) -> &'static str {
        match self {
            Command::List => "list",
            Command::Get { .. } => "get",
            Command::Stats { .. } => "stats",
            Command::Restart { .. } => "restart",
            Command::Reload { .. } => "reload",
            Command::Signal { .. } => "signal",
        }
    }
}

/// Response data variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseData {
    /// Names of all watchers known to the supervisor
    Watchers(Vec<String>),
    /// Requested options of one watcher
    Options(HashMap<String, Value>),
    /// Per-process resource usage
    Stats(StatsReply),
    /// Generic acknowledgement
    Success(String),
}

/// Request message from a plugin to the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub command: Command,
}

/// Response message from the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

impl Request {
    pub fn new(id: u64, command: Command) -> Self {
        Self { id, command }
    }
}

impl Response {
    pub fn success(id: u64, data: ResponseData) -> Self {
        Self {
            id,
            result: Ok(data),
        }
    }

    pub fn error(id: u64, error: String) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }
}
