//! Usage/error/performance summaries derived from execution history.
//!
//! Read-only: analytics never mutates core state. Summaries are computed
//! over the bounded per-skill history maintained by the execution engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use skillgate_types::execution::ExecutionResult;

/// Derived per-skill usage summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillAnalytics {
    pub skill_id: String,
    pub total_executions: u64,
    /// Successes over total, in `[0, 1]`. Zero when there is no history.
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    /// Failure counts keyed by error message.
    pub error_breakdown: BTreeMap<String, u64>,
    /// Distinct users observed in the history window.
    pub unique_users: usize,
}

/// Summarize a skill's execution history.
pub fn summarize(skill_id: &str, history: &[ExecutionResult]) -> SkillAnalytics {
    let total = history.len() as u64;
    let successes = history.iter().filter(|r| r.success).count() as u64;

    let average_execution_time_ms = if history.is_empty() {
        0.0
    } else {
        history.iter().map(|r| r.execution_time_ms as f64).sum::<f64>() / history.len() as f64
    };

    let mut error_breakdown: BTreeMap<String, u64> = BTreeMap::new();
    for result in history.iter().filter(|r| !r.success) {
        let message = result.error.clone().unwrap_or_else(|| "unknown".to_string());
        *error_breakdown.entry(message).or_insert(0) += 1;
    }

    let unique_users: BTreeSet<&str> = history.iter().map(|r| r.user_id.as_str()).collect();

    SkillAnalytics {
        skill_id: skill_id.to_string(),
        total_executions: total,
        success_rate: if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        },
        average_execution_time_ms,
        error_breakdown,
        unique_users: unique_users.len(),
    }
}
