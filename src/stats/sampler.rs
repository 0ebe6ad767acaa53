use crate::stats::MetricRecord;
use std::collections::BTreeMap;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Local process sampler for collecting resource usage of arbitrary PIDs
pub struct ProcessSampler {
    /// System information collector
    system: System,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self { system }
    }

    /// Refresh the readings of `pids`
    ///
    /// CPU usage is computed between two refreshes, so the first refresh of
    /// a PID always reports 0%.
    pub fn refresh(&mut self, pids: &[u32]) {
        let sys_pids: Vec<Pid> = pids.iter().map(|&pid| Pid::from_u32(pid)).collect();

        self.system.refresh_memory();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&sys_pids),
            true,
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );
    }

    /// Readings of one PID as of the last refresh
    ///
    /// A process that does not exist (anymore) yields an all-unavailable
    /// record.
    pub fn read(&self, pid: u32) -> MetricRecord {
        let Some(process) = self.system.process(Pid::from_u32(pid)) else {
            return MetricRecord::unavailable();
        };

        let mem_bytes = process.memory();
        let total = self.system.total_memory();
        let mem_percent = if total > 0 {
            Some(mem_bytes as f64 / total as f64 * 100.0)
        } else {
            None
        };

        MetricRecord {
            cpu_percent: Some(process.cpu_usage() as f64),
            mem_percent,
            mem_bytes: Some(mem_bytes),
        }
    }

    /// Take a full sample, waiting long enough for CPU usage to be meaningful
    pub async fn sample(&mut self, pids: &[u32]) -> BTreeMap<u32, MetricRecord> {
        self.refresh(pids);
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.refresh(pids);

        pids.iter().map(|&pid| (pid, self.read(pid))).collect()
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_sample_live_process() {
        let mut child = Command::new("/bin/sleep")
            .arg("5")
            .spawn()
            .expect("Failed to spawn process");
        let pid = child.id().expect("Failed to get PID");

        let mut sampler = ProcessSampler::new();
        let samples = sampler.sample(&[pid]).await;
        let record = samples[&pid];

        assert!(record.cpu_percent.is_some());
        assert!(record.mem_bytes.unwrap_or(0) > 0);
        assert!(record.mem_percent.is_some());

        let _ = child.kill().await;
    }

    #[tokio::test]
    async fn test_sample_missing_process() {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("exit 0")
            .spawn()
            .expect("Failed to spawn process");
        let pid = child.id().expect("Failed to get PID");
        let _ = child.wait().await;

        let mut sampler = ProcessSampler::new();
        let samples = sampler.sample(&[pid]).await;
        assert_eq!(samples[&pid], MetricRecord::unavailable());
    }
}
