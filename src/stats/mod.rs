// Stats module - Per-process readings as seen by the watchers

pub mod sampler;
pub mod sink;

pub use sampler::ProcessSampler;
pub use sink::{MetricsSink, NoopSink, StatsdSink};

use crate::config::human2bytes;
use crate::error::{Result, WatchError};
use crate::ipc::{StatsReply, StatsStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Marker the supervisor uses for a reading it could not take
const UNAVAILABLE: &str = "N/A";

/// Instantaneous readings of one entity; `None` means unavailable, never zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub mem_bytes: Option<u64>,
}

impl MetricRecord {
    pub fn new(cpu_percent: f64, mem_percent: f64, mem_bytes: u64) -> Self {
        Self {
            cpu_percent: Some(cpu_percent),
            mem_percent: Some(mem_percent),
            mem_bytes: Some(mem_bytes),
        }
    }

    /// Record with every reading unavailable
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Parse one process record from a stats reply
    ///
    /// Returns `None` when `value` is not a record at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;

        Some(Self {
            cpu_percent: percent_reading(record.get("cpu")),
            mem_percent: percent_reading(record.get("mem")),
            mem_bytes: bytes_reading(record.get("mem_info1")),
        })
    }

    /// Average of CPU and memory percentages, when both are known
    pub fn health(&self) -> Option<f64> {
        Some((self.cpu_percent? + self.mem_percent?) / 2.0)
    }
}

fn percent_reading(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s == UNAVAILABLE => None,
        Value::String(s) => {
            let parsed = s.trim().parse::<f64>().ok();
            if parsed.is_none() {
                debug!("Ignoring unparseable percentage reading '{}'", s);
            }
            parsed
        }
        _ => None,
    }
}

fn bytes_reading(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => {
            let bytes = n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            });
            if bytes.is_none() {
                debug!("Ignoring memory reading {}", n);
            }
            bytes
        }
        Value::String(s) if s == UNAVAILABLE => None,
        Value::String(s) => match human2bytes(s) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("Ignoring memory reading: {}", e);
                None
            }
        },
        _ => None,
    }
}

fn sum_available<T, I>(readings: I) -> Option<T>
where
    T: std::ops::Add<Output = T>,
    I: IntoIterator<Item = Option<T>>,
{
    readings
        .into_iter()
        .flatten()
        .fold(None, |acc, reading| match acc {
            Some(total) => Some(total + reading),
            None => Some(reading),
        })
}

/// Parsed stats of one watcher, keyed by process id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    pub processes: BTreeMap<u32, MetricRecord>,
}

impl StatsReport {
    /// Build a report from a stats reply
    ///
    /// An error status is reported as `StatsUnavailable` so that it can never
    /// be mistaken for an idle watcher.
    pub fn from_reply(watcher: &str, reply: &StatsReply) -> Result<Self> {
        if reply.status == StatsStatus::Error {
            return Err(WatchError::StatsUnavailable(watcher.to_string()));
        }

        let processes = reply
            .info
            .iter()
            .filter_map(|(key, value)| {
                let pid = key.parse::<u32>().ok()?;
                let record = MetricRecord::from_value(value)?;
                Some((pid, record))
            })
            .collect();

        Ok(Self { processes })
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Sum every reading over the member processes
    ///
    /// Unavailable readings are left out of the sum; a metric is unavailable
    /// only when no member reported it. Returns `None` without members.
    pub fn aggregate(&self) -> Option<MetricRecord> {
        if self.processes.is_empty() {
            return None;
        }

        let records = self.processes.values();
        Some(MetricRecord {
            cpu_percent: sum_available(records.clone().map(|r| r.cpu_percent)),
            mem_percent: sum_available(records.clone().map(|r| r.mem_percent)),
            mem_bytes: sum_available(records.map(|r| r.mem_bytes)),
        })
    }
}
