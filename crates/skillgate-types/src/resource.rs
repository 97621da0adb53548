//! Per-skill resource usage aggregates.
//!
//! One [`ResourceUsage`] exists per registered skill, updated only by the
//! execution engine after each dispatch.

use serde::{Deserialize, Serialize};

use crate::execution::ResourcesUsed;
use crate::skill::ResourceLimits;

/// Memory usage aggregate in megabytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryUsage {
    pub average_mb: f64,
    pub peak_mb: f64,
    pub limit_mb: u64,
}

/// CPU usage aggregate as percentages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuUsage {
    pub average_percent: f64,
    pub peak_percent: f64,
    pub limit_percent: u8,
}

/// Network counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkUsage {
    pub requests: u64,
    pub bandwidth_bytes: u64,
}

/// Running memory/CPU/network aggregates for a single skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub skill_id: String,
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub network: NetworkUsage,
    /// Number of executions folded into the averages.
    pub samples: u64,
}

impl ResourceUsage {
    /// Zeroed usage for a freshly registered skill, with limits copied from
    /// the skill's declared resource limits.
    pub fn new(skill_id: impl Into<String>, limits: ResourceLimits) -> Self {
        Self {
            skill_id: skill_id.into(),
            memory: MemoryUsage {
                limit_mb: limits.memory_mb,
                ..Default::default()
            },
            cpu: CpuUsage {
                limit_percent: limits.cpu_percent,
                ..Default::default()
            },
            network: NetworkUsage::default(),
            samples: 0,
        }
    }

    /// Fold one execution's measurements into the running aggregates.
    pub fn record(&mut self, used: &ResourcesUsed, network_bytes: u64) {
        let n = self.samples as f64;
        self.memory.average_mb = (self.memory.average_mb * n + used.memory_mb) / (n + 1.0);
        self.memory.peak_mb = self.memory.peak_mb.max(used.memory_mb);
        self.cpu.average_percent = (self.cpu.average_percent * n + used.cpu_percent) / (n + 1.0);
        self.cpu.peak_percent = self.cpu.peak_percent.max(used.cpu_percent);
        self.network.requests += 1;
        self.network.bandwidth_bytes += network_bytes;
        self.samples += 1;
    }
}
