//! Domain events broadcast by the orchestrator.
//!
//! `SkillEvent` is a closed set of variants published on the event bus for
//! external subscribers (alerting, dashboards). All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::skill::SkillCategory;

/// Events emitted by the mutating orchestrator operations and by the
/// execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillEvent {
    /// A skill was added to the registry.
    SkillRegistered {
        skill_id: String,
        category: SkillCategory,
        version: semver::Version,
    },

    /// A skill was removed from the registry.
    SkillUnregistered { skill_id: String },

    /// A skill's metadata was patched.
    SkillUpdated { skill_id: String },

    /// A per-user permission override was created or replaced.
    PermissionGranted {
        skill_id: String,
        user_id: String,
        granted_by: String,
    },

    /// A per-user permission override was revoked.
    PermissionRevoked { skill_id: String, user_id: String },

    /// An execution completed successfully.
    SkillExecuted {
        skill_id: String,
        request_id: Uuid,
        user_id: String,
        execution_time_ms: u64,
    },

    /// An execution failed or timed out.
    SkillExecutionFailed {
        skill_id: String,
        request_id: Uuid,
        user_id: String,
        error: String,
    },
}
