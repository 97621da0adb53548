//! Permission domain types.
//!
//! A [`PermissionGrant`] is a per-user, per-skill override on top of the
//! tier-based default decision. [`Decision`] is the structured answer the
//! policy engine returns for "is this call allowed".

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skill::{AuditLevel, AuditLogType, ResourceLimits, Tier};

/// A user-specific override of the default tier-based access decision.
///
/// A grant with a non-empty `granted_permissions` set allows the
/// `(skill_id, user_id)` pair even when the skill's own permission flags
/// would deny that user's tier. Expired grants are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionGrant {
    pub skill_id: String,
    pub user_id: String,
    pub user_tier: Tier,
    pub granted_permissions: BTreeSet<String>,
    /// Principal that issued the grant, for the audit trail.
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionGrant {
    /// Whether this grant has expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether this grant is active: unexpired and granting at least one
    /// permission.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.granted_permissions.is_empty()
    }
}

/// The structured outcome of a permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    /// Human-readable denial reason, present iff `allowed` is false.
    #[serde(default)]
    pub reason: Option<String>,
    /// Limits the caller must apply when dispatching, present iff allowed.
    #[serde(default)]
    pub restrictions: Option<Restrictions>,
    /// True when a per-user grant flipped a tier-default denial to an allow.
    /// Such break-glass decisions are audited at security level.
    #[serde(default)]
    pub via_grant: bool,
}

impl Decision {
    pub fn allow(restrictions: Restrictions, via_grant: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            restrictions: Some(restrictions),
            via_grant,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            restrictions: None,
            via_grant: false,
        }
    }
}

/// Execution restrictions attached to an allow decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restrictions {
    pub resource_limits: ResourceLimits,
    pub audit_level: AuditLevel,
}

/// Audit-level and retention requirements for a skill, exposed to external
/// retention jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequirements {
    pub level: AuditLevel,
    pub log_types: Vec<AuditLogType>,
    pub retention_days: u32,
}

impl AuditRequirements {
    /// Derive the requirements from a skill's declared audit level.
    pub fn for_level(level: AuditLevel) -> Self {
        Self {
            level,
            log_types: level.log_types().to_vec(),
            retention_days: level.retention_days(),
        }
    }
}
