use crate::config::Action;
use crate::error::{Result, WatchError};
use crate::ipc::Supervisor;
use crate::stats::MetricsSink;
use crate::watcher::monitor::Monitor;
use crate::watcher::registry::EntityId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// What a remediation is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationTarget {
    /// A whole watcher
    Group(String),
    /// One process of a watcher
    Process { name: String, pid: u32 },
}

impl RemediationTarget {
    pub fn for_entity(watcher: &str, entity: &EntityId) -> Self {
        match entity {
            EntityId::Group(name) => RemediationTarget::Group(name.clone()),
            EntityId::Process(pid) => RemediationTarget::Process {
                name: watcher.to_string(),
                pid: *pid,
            },
        }
    }

    /// Watcher owning the target
    pub fn name(&self) -> &str {
        match self {
            RemediationTarget::Group(name) => name,
            RemediationTarget::Process { name, .. } => name,
        }
    }
}

impl std::fmt::Display for RemediationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemediationTarget::Group(name) => write!(f, "{}", name),
            RemediationTarget::Process { name, pid } => write!(f, "{} (pid {})", name, pid),
        }
    }
}

/// Issue `action` against `target` through the supervisor
pub async fn dispatch(
    supervisor: &dyn Supervisor,
    target: &RemediationTarget,
    action: Action,
) -> Result<()> {
    match (action, target) {
        (Action::Restart, target) => supervisor.restart(target.name()).await,
        (Action::Reload, target) => supervisor.reload(target.name()).await,
        (Action::Signal(signal), RemediationTarget::Process { name, pid }) => {
            supervisor.signal(name, *pid, signal as i32).await
        }
        (Action::Signal(signal), RemediationTarget::Group(name)) => {
            Err(WatchError::SignalError(format!(
                "{} can only be delivered to a single process, not to watcher {}",
                signal.as_str(),
                name
            )))
        }
    }
}

/// Decides when a monitor has been in breach long enough and acts on it
pub struct ActionDispatcher {
    watcher: String,
    action: Action,
    max_count: u32,
    debounce: Duration,
    supervisor: Arc<dyn Supervisor>,
    sink: Arc<dyn MetricsSink>,
}

impl ActionDispatcher {
    pub fn new(
        watcher: String,
        action: Action,
        max_count: u32,
        debounce: Duration,
        supervisor: Arc<dyn Supervisor>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            watcher,
            action,
            max_count,
            debounce,
            supervisor,
            sink,
        }
    }

    /// Event name recorded alongside a dispatched action
    pub fn action_event(&self) -> String {
        let outcome = match self.action {
            Action::Restart => "restarting".to_string(),
            Action::Reload => "reloading".to_string(),
            Action::Signal(signal) => format!("signal.{}", signal.as_str()),
        };
        format!("_resource_watcher.{}.{}", self.watcher, outcome)
    }

    /// Whether `monitor` calls for an action at `now`
    pub fn should_act(&self, monitor: &Monitor, now: Instant) -> bool {
        monitor.max_count() > self.max_count && monitor.debounce_elapsed(now, self.debounce)
    }

    /// Act on `target` if its monitor demands it; returns whether an action was issued
    ///
    /// The monitor is reset before the supervisor answers: a failed dispatch
    /// still counts as an attempt and the debounce window throttles retries.
    pub async fn maybe_act(
        &self,
        monitor: &mut Monitor,
        target: &RemediationTarget,
        now: Instant,
    ) -> bool {
        if !self.should_act(monitor, now) {
            return false;
        }

        info!(
            watcher = %self.watcher,
            max_count = monitor.max_count(),
            "Thresholds exceeded for {}, issuing {}",
            target,
            self.action
        );

        monitor.record_action(now);
        self.sink.increment(&self.action_event());

        if let Err(e) = dispatch(self.supervisor.as_ref(), target, self.action).await {
            error!(
                watcher = %self.watcher,
                "Failed to {} {}: {}",
                self.action,
                target,
                e
            );
        }

        true
    }
}
