// Tick timing for the periodic plugins

use std::time::{Duration, Instant};

/// Measures one tick and complains when it overruns its interval
///
/// Ticks never overlap, so a slow supervisor silently stretches the
/// effective loop rate; this makes that visible in the logs.
pub struct TickTimer<'a> {
    plugin: &'a str,
    start: Instant,
    budget: Duration,
}

impl<'a> TickTimer<'a> {
    /// Start timing a tick of `plugin` that should finish within `budget`
    pub fn start(plugin: &'a str, budget: Duration) -> Self {
        Self {
            plugin,
            start: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the tick duration
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();

        if elapsed > self.budget {
            tracing::warn!(
                target: "perf",
                plugin = self.plugin,
                duration_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "Tick overran its loop interval"
            );
        } else {
            tracing::debug!(
                target: "perf",
                plugin = self.plugin,
                duration_ms = elapsed.as_millis() as u64,
                "Tick completed"
            );
        }

        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_timer_measures() {
        let timer = TickTimer::start("web", Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.finish() >= Duration::from_millis(10));
    }

    #[test]
    fn test_tick_timer_overrun() {
        let timer = TickTimer::start("web", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.finish() > Duration::ZERO);
    }
}
