//! Per-skill health monitoring.
//!
//! Pure bookkeeping consumed by the execution engine: the state machine is
//! healthy -> executing -> healthy | failed, with failed persisting until the
//! next successful execution. Each skill's cell is updated under its own
//! DashMap entry lock, so concurrent executions of the same skill cannot
//! corrupt the counters.

use dashmap::DashMap;

use chrono::Utc;
use skillgate_types::health::{HealthStatus, SkillStatus};

/// Error-rate increase applied per failed execution.
pub const ERROR_RATE_RAISE: f64 = 0.1;
/// Error-rate decay applied per successful execution.
pub const ERROR_RATE_DECAY: f64 = 0.05;

/// Tracks one [`HealthStatus`] per registered skill.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    statuses: DashMap<String, HealthStatus>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize tracking for a freshly registered skill.
    pub fn init(&self, skill_id: &str) {
        self.statuses
            .insert(skill_id.to_string(), HealthStatus::new(skill_id));
    }

    /// Drop tracking for an unregistered skill.
    pub fn remove(&self, skill_id: &str) {
        self.statuses.remove(skill_id);
    }

    pub fn get(&self, skill_id: &str) -> Option<HealthStatus> {
        self.statuses.get(skill_id).map(|s| s.clone())
    }

    /// All tracked statuses, sorted by skill id.
    pub fn all(&self) -> Vec<HealthStatus> {
        let mut statuses: Vec<HealthStatus> =
            self.statuses.iter().map(|s| s.clone()).collect();
        statuses.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
        statuses
    }

    /// Mark a skill as currently executing.
    pub fn mark_executing(&self, skill_id: &str) {
        if let Some(mut status) = self.statuses.get_mut(skill_id) {
            status.status = SkillStatus::Executing;
            status.last_heartbeat = Utc::now();
        }
    }

    /// Record a successful execution: back to healthy, failure streak
    /// reset, error rate decayed by 0.05 (floored at 0).
    pub fn record_success(&self, skill_id: &str, elapsed_ms: u64) -> Option<HealthStatus> {
        let mut status = self.statuses.get_mut(skill_id)?;
        status.status = SkillStatus::Healthy;
        status.consecutive_failures = 0;
        status.error_rate = (status.error_rate - ERROR_RATE_DECAY).max(0.0);
        fold_response_time(&mut status, elapsed_ms);
        Some(status.clone())
    }

    /// Record a failed or timed-out execution: failed status, streak
    /// incremented, error rate raised by 0.1 (capped at 1.0).
    pub fn record_failure(&self, skill_id: &str, elapsed_ms: u64) -> Option<HealthStatus> {
        let mut status = self.statuses.get_mut(skill_id)?;
        status.status = SkillStatus::Failed;
        status.consecutive_failures += 1;
        status.error_rate = (status.error_rate + ERROR_RATE_RAISE).min(1.0);
        fold_response_time(&mut status, elapsed_ms);
        Some(status.clone())
    }

    /// Re-install persisted or recomputed status at startup.
    pub fn restore(&self, status: HealthStatus) {
        self.statuses.insert(status.skill_id.clone(), status);
    }
}

fn fold_response_time(status: &mut HealthStatus, elapsed_ms: u64) {
    let n = status.total_executions as f64;
    status.average_response_time_ms =
        (status.average_response_time_ms * n + elapsed_ms as f64) / (n + 1.0);
    status.total_executions += 1;
    status.last_heartbeat = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_starts_healthy() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        let status = monitor.get("audio-processor").unwrap();
        assert_eq!(status.status, SkillStatus::Healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.error_rate, 0.0);
    }

    #[test]
    fn five_failures_degrade_to_half_error_rate() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        for _ in 0..5 {
            monitor.record_failure("audio-processor", 100);
        }

        let status = monitor.get("audio-processor").unwrap();
        assert_eq!(status.status, SkillStatus::Failed);
        assert_eq!(status.consecutive_failures, 5);
        assert!((status.error_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn error_rate_caps_at_one() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        for _ in 0..15 {
            monitor.record_failure("audio-processor", 100);
        }

        let status = monitor.get("audio-processor").unwrap();
        assert_eq!(status.consecutive_failures, 15);
        assert_eq!(status.error_rate, 1.0);
    }

    #[test]
    fn success_after_failures_resets_streak_and_decays_rate() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        for _ in 0..3 {
            monitor.record_failure("audio-processor", 100);
        }
        let status = monitor.record_success("audio-processor", 50).unwrap();

        assert_eq!(status.status, SkillStatus::Healthy);
        assert_eq!(status.consecutive_failures, 0);
        // 0.3 - 0.05
        assert!((status.error_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn error_rate_floors_at_zero() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        monitor.record_success("audio-processor", 50);
        let status = monitor.get("audio-processor").unwrap();
        assert_eq!(status.error_rate, 0.0);
    }

    #[test]
    fn average_response_time_is_running_mean() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        monitor.record_success("audio-processor", 100);
        monitor.record_success("audio-processor", 300);

        let status = monitor.get("audio-processor").unwrap();
        assert_eq!(status.total_executions, 2);
        assert!((status.average_response_time_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn executing_is_transient() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");

        monitor.mark_executing("audio-processor");
        assert_eq!(
            monitor.get("audio-processor").unwrap().status,
            SkillStatus::Executing
        );

        monitor.record_success("audio-processor", 10);
        assert_eq!(
            monitor.get("audio-processor").unwrap().status,
            SkillStatus::Healthy
        );
    }

    #[test]
    fn remove_stops_tracking() {
        let monitor = HealthMonitor::new();
        monitor.init("audio-processor");
        monitor.remove("audio-processor");

        assert!(monitor.get("audio-processor").is_none());
        assert!(monitor.record_failure("audio-processor", 10).is_none());
    }
}
