use crate::config::CommandReloaderConfig;
use crate::error::{Result, WatchError};
use crate::ipc::Supervisor;
use crate::perf::TickTimer;
use crate::stats::MetricsSink;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Watchers registered by plugins carry this prefix and are never reloaded
const PLUGIN_PREFIX: &str = "plugin:";

/// Last observed state of a watcher's command or working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPath {
    pub path: PathBuf,
    pub mtime: SystemTime,
}

/// Modification time of `path`; for a directory, the newest file below it
///
/// Symlinked files count with the mtime of their target. Symlinked
/// directories are not descended into.
pub fn mtime_of_path(path: &Path) -> std::io::Result<SystemTime> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        return metadata.modified();
    }

    let mut newest = SystemTime::UNIX_EPOCH;
    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry?;
        let metadata = std::fs::metadata(entry.path())?;
        if !metadata.is_dir() {
            newest = newest.max(metadata.modified()?);
        }
    }

    Ok(newest)
}

/// Restarts watchers whose command (or working directory) changed on disk
pub struct CommandReloader {
    config: CommandReloaderConfig,
    supervisor: Arc<dyn Supervisor>,
    sink: Arc<dyn MetricsSink>,
    known: HashMap<String, WatchedPath>,
}

impl CommandReloader {
    pub fn new(
        config: CommandReloaderConfig,
        supervisor: Arc<dyn Supervisor>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            supervisor,
            sink,
            known: HashMap::new(),
        }
    }

    pub fn known(&self) -> &HashMap<String, WatchedPath> {
        &self.known
    }

    fn is_selected(&self, watcher: &str) -> bool {
        if watcher.starts_with(PLUGIN_PREFIX) {
            return false;
        }
        match &self.config.watchers {
            Some(names) => names.iter().any(|name| name == watcher),
            None => true,
        }
    }

    /// Resolve the path to watch for `watcher` and read its mtime
    async fn observe(&self, watcher: &str) -> Result<WatchedPath> {
        let key = if self.config.use_working_dir {
            "working_dir"
        } else {
            "cmd"
        };

        let options = self.supervisor.get(watcher, &["cmd", "working_dir"]).await?;
        let raw = options
            .get(key)
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                WatchError::ProtocolError(format!("watcher {} has no '{}' option", watcher, key))
            })?;

        let path = std::fs::canonicalize(raw)?;
        let mtime = mtime_of_path(&path)?;

        Ok(WatchedPath { path, mtime })
    }

    async fn remediate(&self, watcher: &str) {
        let (result, outcome) = if self.config.use_reload {
            (self.supervisor.reload(watcher).await, "reloading")
        } else {
            (self.supervisor.restart(watcher).await, "restarting")
        };

        self.sink
            .increment(&format!("_command_reloader.{}.{}", watcher, outcome));
        if let Err(e) = result {
            error!(watcher = %watcher, "Failed to act on modified command: {}", e);
        }
    }

    /// Run one detection cycle; returns the watchers that were acted upon
    pub async fn tick(&mut self) -> Vec<String> {
        let listed = match self.supervisor.list().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Skipping command reloader tick, list failed: {}", e);
                return Vec::new();
            }
        };

        let watchers: Vec<String> = listed
            .into_iter()
            .filter(|watcher| self.is_selected(watcher))
            .collect();

        self.known.retain(|watcher, _| watchers.contains(watcher));

        let mut modified = Vec::new();
        for watcher in watchers {
            let current = match self.observe(&watcher).await {
                Ok(current) => current,
                Err(e) => {
                    debug!(watcher = %watcher, "Cannot check command: {}", e);
                    continue;
                }
            };

            if let Some(previous) = self.known.get(&watcher) {
                if *previous != current {
                    let when: DateTime<Local> = current.mtime.into();
                    info!(
                        "{} modified ({}). {} {}.",
                        current.path.display(),
                        when.format("%Y-%m-%d %H:%M:%S"),
                        if self.config.use_reload { "Reloading" } else { "Restarting" },
                        watcher
                    );
                    self.remediate(&watcher).await;
                    modified.push(watcher.clone());
                }
            }

            self.known.insert(watcher, current);
        }

        modified
    }

    /// Tick every `loop_rate` until `shutdown` flips to true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting command reloader (loop rate: {:?}, watching {})",
            self.config.loop_rate,
            if self.config.use_working_dir {
                "working directories"
            } else {
                "commands"
            }
        );

        let mut ticker = interval(self.config.loop_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = TickTimer::start("command_reloader", self.config.loop_rate);
                    self.tick().await;
                    timer.finish();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Command reloader stopped");
    }
}
