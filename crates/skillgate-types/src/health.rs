//! Per-skill health status.
//!
//! One [`HealthStatus`] exists per registered skill. Its counters change
//! only through the execution engine's success/failure path; consumers read
//! it via the health monitor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A skill's current liveness/error classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    Healthy,
    Executing,
    /// Reserved for operator-forced degradation; the execution engine's
    /// transition rule never produces it on its own.
    Degraded,
    Failed,
}

impl fmt::Display for SkillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Executing => "executing",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Liveness and error-rate tracking for a single skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub skill_id: String,
    pub status: SkillStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub consecutive_failures: u32,
    /// When this skill entered service (registration time).
    pub uptime_since: DateTime<Utc>,
    /// Running average over all completed executions, in milliseconds.
    pub average_response_time_ms: f64,
    /// Rolling error rate in `[0, 1]`.
    pub error_rate: f64,
    pub total_executions: u64,
}

impl HealthStatus {
    /// Initial state for a freshly registered skill.
    pub fn new(skill_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            skill_id: skill_id.into(),
            status: SkillStatus::Healthy,
            last_heartbeat: now,
            consecutive_failures: 0,
            uptime_since: now,
            average_response_time_ms: 0.0,
            error_rate: 0.0,
            total_executions: 0,
        }
    }
}
