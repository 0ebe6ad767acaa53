// Shared fakes for integration tests
#![allow(dead_code)]

use adasa_watch::error::{Result, WatchError};
use adasa_watch::ipc::{StatsReply, Supervisor};
use adasa_watch::stats::MetricsSink;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Calls that change the supervisor's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Restart(String),
    Reload(String),
    Signal { name: String, pid: u32, signum: i32 },
}

/// Scripted supervisor
///
/// Stats replies are served in order and the last one repeats. A `None`
/// entry simulates a broken control channel. Remediation calls are always
/// recorded, and answer with an error while `fail_actions` is set.
#[derive(Default)]
pub struct FakeSupervisor {
    stats: Mutex<VecDeque<Option<StatsReply>>>,
    watchers: Mutex<Vec<String>>,
    options: Mutex<HashMap<String, HashMap<String, Value>>>,
    calls: Mutex<Vec<Call>>,
    fail_actions: AtomicBool,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stats(&self, info: Value) {
        self.stats.lock().unwrap().push_back(Some(stats_reply(info)));
    }

    pub fn push_stats_error(&self) {
        self.stats
            .lock()
            .unwrap()
            .push_back(Some(StatsReply::error()));
    }

    pub fn push_stats_failure(&self) {
        self.stats.lock().unwrap().push_back(None);
    }

    pub fn set_watchers(&self, names: &[&str]) {
        *self.watchers.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn set_options(&self, watcher: &str, options: Value) {
        let options: HashMap<String, Value> = serde_json::from_value(options).unwrap();
        self.options
            .lock()
            .unwrap()
            .insert(watcher.to_string(), options);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_actions.load(Ordering::SeqCst) {
            return Err(WatchError::SupervisorError("action refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.watchers.lock().unwrap().clone())
    }

    async fn get(&self, name: &str, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let options = self.options.lock().unwrap();
        let watcher = options
            .get(name)
            .ok_or_else(|| WatchError::SupervisorError(format!("unknown watcher {}", name)))?;
        Ok(keys
            .iter()
            .filter_map(|key| watcher.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn stats(&self, _name: &str) -> Result<StatsReply> {
        let mut stats = self.stats.lock().unwrap();
        let next = if stats.len() > 1 {
            stats.pop_front().flatten()
        } else {
            stats.front().cloned().flatten()
        };
        next.ok_or_else(|| WatchError::ConnectionError("control channel down".to_string()))
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.record(Call::Restart(name.to_string()))
    }

    async fn reload(&self, name: &str) -> Result<()> {
        self.record(Call::Reload(name.to_string()))
    }

    async fn signal(&self, name: &str, pid: u32, signum: i32) -> Result<()> {
        self.record(Call::Signal {
            name: name.to_string(),
            pid,
            signum,
        })
    }
}

/// Keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| *event == name)
            .count()
    }
}

impl MetricsSink for RecordingSink {
    fn increment(&self, name: &str) {
        self.events.lock().unwrap().push(name.to_string());
    }
}

pub fn stats_reply(info: Value) -> StatsReply {
    let info: HashMap<String, Value> = serde_json::from_value(info).unwrap();
    StatsReply::ok(info)
}
