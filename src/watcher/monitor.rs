use crate::watcher::evaluator::{Evaluation, Metric};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Breach state of one monitored entity
#[derive(Debug, Clone, Default)]
pub struct Monitor {
    /// Consecutive breaches per metric
    counters: BTreeMap<Metric, u32>,
    /// When the last remediation was issued, if ever
    last_action: Option<Instant>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick's evaluation into the breach counters
    ///
    /// Breached metrics count up, metrics that were checked and passed go back
    /// to zero, and skipped metrics (unavailable reading) keep their streak.
    pub fn record(&mut self, evaluation: &Evaluation) {
        for &metric in &evaluation.evaluated {
            if evaluation.breached.contains(&metric) {
                *self.counters.entry(metric).or_insert(0) += 1;
            } else {
                self.counters.insert(metric, 0);
            }
        }
    }

    pub fn count(&self, metric: Metric) -> u32 {
        self.counters.get(&metric).copied().unwrap_or(0)
    }

    /// Longest running streak over all metrics
    pub fn max_count(&self) -> u32 {
        self.counters.values().copied().max().unwrap_or(0)
    }

    pub fn counters(&self) -> &BTreeMap<Metric, u32> {
        &self.counters
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }

    /// Whether at least `window` has passed since the last remediation
    pub fn debounce_elapsed(&self, now: Instant, window: Duration) -> bool {
        match self.last_action {
            Some(at) => now.saturating_duration_since(at) >= window,
            None => true,
        }
    }

    /// Mark a remediation as issued at `now` and start counting afresh
    pub fn record_action(&mut self, now: Instant) {
        self.last_action = Some(now);
        for count in self.counters.values_mut() {
            *count = 0;
        }
    }
}
