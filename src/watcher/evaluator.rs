use crate::config::{MemLimit, ThresholdConfig};
use crate::stats::MetricRecord;
use std::collections::BTreeSet;

/// One threshold check applied to an entity's readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    MaxCpu,
    MinCpu,
    MaxMem,
    MaxMemAbs,
    MinMem,
    MinMemAbs,
    Health,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::MaxCpu => "max_cpu",
            Metric::MinCpu => "min_cpu",
            Metric::MaxMem => "max_mem",
            Metric::MaxMemAbs => "max_mem_abs",
            Metric::MinMem => "min_mem",
            Metric::MinMemAbs => "min_mem_abs",
            Metric::Health => "health",
        }
    }

    /// Event suffix emitted for a breach, e.g. `over_cpu`
    pub fn breach_event(&self) -> &'static str {
        match self {
            Metric::MaxCpu => "over_cpu",
            Metric::MinCpu => "under_cpu",
            Metric::MaxMem | Metric::MaxMemAbs => "over_mem",
            Metric::MinMem | Metric::MinMemAbs => "under_mem",
            Metric::Health => "over_health",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of checking one record against the thresholds
///
/// `breached` is always a subset of `evaluated`. A metric missing from
/// `evaluated` was skipped: its check is disabled or its reading unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub breached: BTreeSet<Metric>,
    pub evaluated: BTreeSet<Metric>,
}

impl Evaluation {
    fn check<T: PartialOrd>(&mut self, metric: Metric, reading: Option<T>, limit: Option<T>) {
        let (Some(reading), Some(limit)) = (reading, limit) else {
            return;
        };

        let breached = match metric {
            Metric::MinCpu | Metric::MinMem | Metric::MinMemAbs => reading < limit,
            _ => reading > limit,
        };

        self.evaluated.insert(metric);
        if breached {
            self.breached.insert(metric);
        }
    }

    pub fn is_breached(&self, metric: Metric) -> bool {
        self.breached.contains(&metric)
    }
}

/// Memory limits select either the percentage or the absolute check
fn check_mem(
    evaluation: &mut Evaluation,
    record: &MetricRecord,
    limit: Option<MemLimit>,
    percent: Metric,
    absolute: Metric,
) {
    match limit {
        Some(MemLimit::Percent(p)) => evaluation.check(percent, record.mem_percent, Some(p)),
        Some(MemLimit::Bytes(b)) => evaluation.check(absolute, record.mem_bytes, Some(b)),
        None => {}
    }
}

/// Decide which metrics of `record` breach `thresholds` this tick
pub fn evaluate(record: &MetricRecord, thresholds: &ThresholdConfig) -> Evaluation {
    let mut evaluation = Evaluation::default();

    evaluation.check(Metric::MaxCpu, record.cpu_percent, thresholds.max_cpu);
    evaluation.check(Metric::MinCpu, record.cpu_percent, thresholds.min_cpu);

    check_mem(&mut evaluation, record, thresholds.max_mem, Metric::MaxMem, Metric::MaxMemAbs);
    check_mem(&mut evaluation, record, thresholds.min_mem, Metric::MinMem, Metric::MinMemAbs);

    evaluation.check(Metric::Health, record.health(), thresholds.health_threshold);

    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> ThresholdConfig {
        ThresholdConfig {
            max_cpu: None,
            min_cpu: None,
            max_mem: None,
            min_mem: None,
            health_threshold: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_thresholds_never_breach() {
        let thresholds = disabled();
        for record in [
            MetricRecord::new(0.0, 0.0, 0),
            MetricRecord::new(1000.0, 1000.0, u64::MAX),
            MetricRecord::unavailable(),
        ] {
            let evaluation = evaluate(&record, &thresholds);
            assert!(evaluation.breached.is_empty());
            assert!(evaluation.evaluated.is_empty());
        }
    }

    #[test]
    fn test_max_and_min_cpu() {
        let thresholds = ThresholdConfig {
            max_cpu: Some(90.0),
            min_cpu: Some(5.0),
            ..disabled()
        };

        let high = evaluate(&MetricRecord::new(95.0, 10.0, 0), &thresholds);
        assert!(high.is_breached(Metric::MaxCpu));
        assert!(!high.is_breached(Metric::MinCpu));
        assert!(high.evaluated.contains(&Metric::MinCpu));

        let low = evaluate(&MetricRecord::new(1.0, 10.0, 0), &thresholds);
        assert!(low.is_breached(Metric::MinCpu));
        assert!(!low.is_breached(Metric::MaxCpu));

        // Thresholds are strict
        let edge = evaluate(&MetricRecord::new(90.0, 10.0, 0), &thresholds);
        assert!(edge.breached.is_empty());
    }

    #[test]
    fn test_absolute_memory_selected() {
        let thresholds = ThresholdConfig {
            max_mem: Some(MemLimit::Bytes(500 * 1024 * 1024)),
            ..disabled()
        };

        let evaluation = evaluate(&MetricRecord::new(0.0, 10.0, 600_000_000), &thresholds);
        assert!(evaluation.is_breached(Metric::MaxMemAbs));
        assert!(!evaluation.evaluated.contains(&Metric::MaxMem));

        // A high percentage does not influence the absolute check
        let evaluation = evaluate(&MetricRecord::new(0.0, 95.0, 1024), &thresholds);
        assert!(evaluation.breached.is_empty());
        assert!(evaluation.evaluated.contains(&Metric::MaxMemAbs));
    }

    #[test]
    fn test_percent_memory_and_min_memory() {
        let thresholds = ThresholdConfig {
            max_mem: Some(MemLimit::Percent(80.0)),
            min_mem: Some(MemLimit::Bytes(1024)),
            ..disabled()
        };

        let evaluation = evaluate(&MetricRecord::new(0.0, 85.0, 512), &thresholds);
        assert!(evaluation.is_breached(Metric::MaxMem));
        assert!(evaluation.is_breached(Metric::MinMemAbs));
    }

    #[test]
    fn test_unavailable_readings_are_skipped() {
        let thresholds = ThresholdConfig::default();
        let record = MetricRecord {
            cpu_percent: Some(99.0),
            mem_percent: None,
            mem_bytes: None,
        };

        let evaluation = evaluate(&record, &thresholds);
        assert!(evaluation.is_breached(Metric::MaxCpu));
        assert!(!evaluation.evaluated.contains(&Metric::MaxMem));
        // Health needs both percentages
        assert!(!evaluation.evaluated.contains(&Metric::Health));
    }

    #[test]
    fn test_health() {
        let thresholds = ThresholdConfig {
            health_threshold: Some(75.0),
            ..disabled()
        };

        assert!(evaluate(&MetricRecord::new(80.0, 80.0, 0), &thresholds).is_breached(Metric::Health));
        assert!(!evaluate(&MetricRecord::new(100.0, 40.0, 0), &thresholds).is_breached(Metric::Health));
    }

    #[test]
    fn test_breach_events() {
        assert_eq!(Metric::MaxMemAbs.breach_event(), "over_mem");
        assert_eq!(Metric::MinCpu.breach_event(), "under_cpu");
        assert_eq!(Metric::Health.breach_event(), "over_health");
    }
}
