//! Process resource sampling backed by `sysinfo`.

use async_trait::async_trait;
use sooty_core::ports::{MonitorError, ResourceMonitor, ResourceSample};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

/// Samples a process on demand.
///
/// CPU usage is a delta between two refreshes, so each sample waits
/// [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] between them. Nothing is cached
/// across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoMonitor;

impl SysinfoMonitor {
    pub const fn new() -> Self {
        Self
    }
}

fn refresh(system: &mut System, pid: Pid) -> usize {
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_cpu().with_memory(),
    )
}

#[async_trait]
impl ResourceMonitor for SysinfoMonitor {
    async fn sample(&self, pid: u32) -> Result<ResourceSample, MonitorError> {
        let target = Pid::from_u32(pid);
        let mut system = System::new();

        if refresh(&mut system, target) == 0 {
            return Err(MonitorError::NoSuchProcess { pid });
        }
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        refresh(&mut system, target);

        let process = system
            .process(target)
            .ok_or(MonitorError::NoSuchProcess { pid })?;
        let sample = ResourceSample {
            pid,
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
        };
        debug!(pid, cpu = sample.cpu_percent, memory = sample.memory_bytes, "sampled process");
        Ok(sample)
    }
}
