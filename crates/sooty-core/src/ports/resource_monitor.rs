//! Resource monitor port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("No such process: {pid}")]
    NoSuchProcess { pid: u32 },
}

/// One CPU and memory sample for a process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub pid: u32,
    /// Percentage of one core; may exceed 100 on multi-core hosts.
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Metrics reported for a server, whether or not it is running.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerMetrics {
    pub running: bool,
    pub pid: Option<u32>,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

impl ServerMetrics {
    /// Metrics for a server with no process.
    pub const fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
            cpu_percent: 0.0,
            memory_bytes: 0,
        }
    }
}

impl From<ResourceSample> for ServerMetrics {
    fn from(sample: ResourceSample) -> Self {
        Self {
            running: true,
            pid: Some(sample.pid),
            cpu_percent: sample.cpu_percent,
            memory_bytes: sample.memory_bytes,
        }
    }
}

/// Samples live process resource usage.
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    async fn sample(&self, pid: u32) -> Result<ResourceSample, MonitorError>;
}
