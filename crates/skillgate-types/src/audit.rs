//! Audit trail domain types.
//!
//! An [`AuditEntry`] is immutable once written. The global audit log is a
//! single append-only ordered sequence shared by every component; its size
//! bound lives in the core audit log, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of an audit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventLevel {
    Info,
    Warning,
    /// Execution failures and timeouts.
    Critical,
    /// Break-glass permission overrides and other security-relevant actions.
    Security,
}

/// An immutable record of a system action, for compliance and forensics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: AuditEventLevel,
    /// Machine-readable action name, e.g. `skill_registered`.
    pub action: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
    /// Free-form detail text for human review.
    pub details: String,
    /// SHA-256 hash of the request parameters (not raw parameters, for
    /// privacy). Only present on execution entries.
    #[serde(default)]
    pub input_hash: Option<String>,
}

impl AuditEntry {
    /// Build an entry with a fresh time-sortable id and current timestamp.
    pub fn new(
        level: AuditEventLevel,
        action: impl Into<String>,
        user_id: Option<String>,
        skill_id: Option<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            level,
            action: action.into(),
            user_id,
            skill_id,
            details: details.into(),
            input_hash: None,
        }
    }

    /// Attach a parameter hash to this entry.
    pub fn with_input_hash(mut self, hash: impl Into<String>) -> Self {
        self.input_hash = Some(hash.into());
        self
    }
}
