use crate::config::ResourceWatcherConfig;
use crate::ipc::Supervisor;
use crate::perf::TickTimer;
use crate::stats::{MetricRecord, MetricsSink, StatsReport};
use crate::watcher::dispatcher::{ActionDispatcher, RemediationTarget};
use crate::watcher::evaluator::evaluate;
use crate::watcher::registry::{EntityId, MonitorRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What a single tick ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stats were unavailable or there was nothing to look at
    Skipped,
    /// Every live entity was evaluated
    Completed { entities: usize, actions: usize },
}

/// Periodically checks one watcher's resource usage and remediates sustained breaches
pub struct ResourceWatcher {
    config: ResourceWatcherConfig,
    supervisor: Arc<dyn Supervisor>,
    sink: Arc<dyn MetricsSink>,
    registry: MonitorRegistry,
    dispatcher: ActionDispatcher,
}

impl ResourceWatcher {
    pub fn new(
        config: ResourceWatcherConfig,
        supervisor: Arc<dyn Supervisor>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(
            config.watcher.clone(),
            config.thresholds.action,
            config.thresholds.max_count,
            config.debounce,
            Arc::clone(&supervisor),
            Arc::clone(&sink),
        );

        Self {
            config,
            supervisor,
            sink,
            registry: MonitorRegistry::new(),
            dispatcher,
        }
    }

    pub fn config(&self) -> &ResourceWatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    fn event(&self, suffix: &str) -> String {
        format!("_resource_watcher.{}.{}", self.config.watcher, suffix)
    }

    /// Pull stats, failing on an error status or a broken control channel
    async fn collect(&self) -> Option<StatsReport> {
        let watcher = &self.config.watcher;

        let report = match self.supervisor.stats(watcher).await {
            Ok(reply) => StatsReport::from_reply(watcher, &reply),
            Err(e) => Err(e),
        };

        match report {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(watcher = %watcher, "Skipping tick, stats unavailable: {}", e);
                self.sink.increment(&self.event("error"));
                None
            }
        }
    }

    /// Live entities with their readings for this tick
    fn entities(&self, report: StatsReport) -> Option<Vec<(EntityId, MetricRecord)>> {
        if self.config.thresholds.per_process {
            return Some(
                report
                    .processes
                    .into_iter()
                    .map(|(pid, record)| (EntityId::Process(pid), record))
                    .collect(),
            );
        }

        let total = report.aggregate()?;
        Some(vec![(EntityId::Group(self.config.watcher.clone()), total)])
    }

    pub async fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now()).await
    }

    /// Run one monitoring cycle as if the clock read `now`
    pub async fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let Some(report) = self.collect().await else {
            return TickOutcome::Skipped;
        };

        let Some(entities) = self.entities(report) else {
            debug!(watcher = %self.config.watcher, "No processes reported, skipping tick");
            return TickOutcome::Skipped;
        };

        let live: HashSet<EntityId> = entities.iter().map(|(entity, _)| entity.clone()).collect();
        let reconciled = self.registry.reconcile(&live);
        if reconciled.added > 0 || reconciled.removed > 0 {
            debug!(
                watcher = %self.config.watcher,
                added = reconciled.added,
                removed = reconciled.removed,
                "Monitored entities changed"
            );
        }

        let mut actions = 0;
        for (entity, record) in &entities {
            let evaluation = evaluate(record, &self.config.thresholds);
            for metric in &evaluation.breached {
                debug!(watcher = %self.config.watcher, "{} breached {}", entity, metric);
                self.sink.increment(&self.event(metric.breach_event()));
            }

            let Some(monitor) = self.registry.get_mut(entity) else {
                continue;
            };
            monitor.record(&evaluation);

            let target = RemediationTarget::for_entity(&self.config.watcher, entity);
            if self.dispatcher.maybe_act(monitor, &target, now).await {
                actions += 1;
            }
        }

        TickOutcome::Completed {
            entities: entities.len(),
            actions,
        }
    }

    /// Tick every `loop_rate` until `shutdown` flips to true or its sender is dropped
    ///
    /// Ticks run to completion one after another; a slow tick delays the next
    /// one instead of overlapping it.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            watcher = %self.config.watcher,
            "Starting resource watcher (loop rate: {:?}, action: {})",
            self.config.loop_rate,
            self.config.thresholds.action
        );

        let mut ticker = interval(self.config.loop_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let plugin = format!("resource_watcher:{}", self.config.watcher);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = TickTimer::start(&plugin, self.config.loop_rate);
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

        info!(watcher = %self.config.watcher, "Resource watcher stopped");
    }
}
