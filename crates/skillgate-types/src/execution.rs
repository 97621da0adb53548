//! Execution request and result types.
//!
//! An [`ExecutionRequest`] is transient, one per invocation; the resulting
//! [`ExecutionResult`] is appended to a bounded per-skill history and is the
//! input for analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::skill::{ExecutionContext, Role, Tier};

/// A single invocation of a skill through the orchestrator.
///
/// Identity fields (`user_id`, `role`, `tier`) are supplied by the external
/// identity collaborator; the orchestrator never mints them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub request_id: Uuid,
    pub skill_id: String,
    pub user_id: String,
    pub role: Role,
    pub tier: Tier,
    pub context: ExecutionContext,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ExecutionRequest {
    /// Build a request with a fresh time-sortable request id.
    pub fn new(
        skill_id: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
        tier: Tier,
        context: ExecutionContext,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            skill_id: skill_id.into(),
            user_id: user_id.into(),
            role,
            tier,
            context,
            parameters,
        }
    }
}

/// Resources consumed by a single execution.
///
/// Figures come from the sandbox when it reports them, otherwise they are
/// synthesized from the skill's declared limits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourcesUsed {
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub duration_ms: u64,
}

/// The outcome of a single skill execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub skill_id: String,
    pub request_id: Uuid,
    pub user_id: String,
    /// The sandbox's output value on success.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Failure reason: permission denial, unknown skill, sandbox error,
    /// or timeout.
    #[serde(default)]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub resources_used: ResourcesUsed,
    /// Ids of the audit entries written for this invocation.
    #[serde(default)]
    pub audit_ids: Vec<Uuid>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// A failed result that never reached the sandbox (permission denial,
    /// unknown skill, invalid context). Carries zero resource usage.
    pub fn rejected(request: &ExecutionRequest, error: impl Into<String>) -> Self {
        Self {
            success: false,
            skill_id: request.skill_id.clone(),
            request_id: request.request_id,
            user_id: request.user_id.clone(),
            output: None,
            error: Some(error.into()),
            execution_time_ms: 0,
            resources_used: ResourcesUsed::default(),
            audit_ids: Vec::new(),
            completed_at: Utc::now(),
        }
    }
}
