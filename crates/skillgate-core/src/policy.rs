//! Permission policy engine.
//!
//! Answers "is this call allowed" by checking the role, tier, and execution
//! context of a request against the skill's declared permission flags and
//! contexts. The tier-default decision can be overridden by a per-user
//! [`PermissionGrant`]: an active grant allows the `(skill, user)` pair even
//! when the tier ladder would deny it. Overrides are bounded (expired grants
//! are ignored) and the decision is marked so the caller can audit the
//! break-glass at security level.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use skillgate_types::error::PolicyError;
use skillgate_types::permission::{AuditRequirements, Decision, PermissionGrant, Restrictions};
use skillgate_types::skill::{ExecutionContext, Role, Skill, Tier};

/// Evaluate the full permission matrix for one request. Pure function; the
/// grant, if any, must belong to the same `(skill, user)` pair.
///
/// Check order: role, then tier (where the grant override applies), then
/// execution context. The first failing dimension produces the denial
/// reason.
pub fn evaluate(
    skill: &Skill,
    grant: Option<&PermissionGrant>,
    role: Role,
    tier: Tier,
    context: ExecutionContext,
) -> Decision {
    if !skill.allows_role(role) {
        return Decision::deny(format!("role {role} not allowed for skill {}", skill.id));
    }

    let tier_default = skill.allows_tier(tier);
    let override_active = grant.is_some_and(|g| g.is_active(Utc::now()));
    let has_permission = if grant.is_some() {
        override_active
    } else {
        tier_default
    };
    if !has_permission {
        return Decision::deny(format!("tier {tier} not allowed for skill {}", skill.id));
    }

    if !skill.allows_context(context) {
        return Decision::deny(format!(
            "execution context {context} not allowed for skill {}",
            skill.id
        ));
    }

    Decision::allow(
        Restrictions {
            resource_limits: skill.resource_limits,
            audit_level: skill.audit_level,
        },
        override_active && !tier_default,
    )
}

/// Holds per-user permission grants and performs permission checks.
///
/// Grants are keyed by user id; each user may hold many grants (one per
/// skill). Granting for an existing `(skill, user)` pair replaces the
/// previous grant.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    grants: RwLock<HashMap<String, Vec<PermissionGrant>>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full permission check for one request against one skill.
    pub async fn can_execute(
        &self,
        skill: &Skill,
        user_id: &str,
        role: Role,
        tier: Tier,
        context: ExecutionContext,
    ) -> Decision {
        let grant = self.grant_for(&skill.id, user_id).await;
        evaluate(skill, grant.as_ref(), role, tier, context)
    }

    /// Install a grant, replacing any existing grant for the same
    /// `(skill, user)` pair.
    pub async fn grant(&self, grant: PermissionGrant) {
        let mut grants = self.grants.write().await;
        let user_grants = grants.entry(grant.user_id.clone()).or_default();
        user_grants.retain(|g| g.skill_id != grant.skill_id);
        user_grants.push(grant);
    }

    /// Remove the grant for a `(skill, user)` pair, returning it.
    pub async fn revoke(
        &self,
        skill_id: &str,
        user_id: &str,
    ) -> Result<PermissionGrant, PolicyError> {
        let mut grants = self.grants.write().await;
        let user_grants = grants.get_mut(user_id).ok_or_else(|| {
            PolicyError::GrantNotFound {
                skill_id: skill_id.to_string(),
                user_id: user_id.to_string(),
            }
        })?;
        let position = user_grants
            .iter()
            .position(|g| g.skill_id == skill_id)
            .ok_or_else(|| PolicyError::GrantNotFound {
                skill_id: skill_id.to_string(),
                user_id: user_id.to_string(),
            })?;
        let removed = user_grants.remove(position);
        if user_grants.is_empty() {
            grants.remove(user_id);
        }
        Ok(removed)
    }

    /// The grant for a `(skill, user)` pair, if one exists.
    pub async fn grant_for(&self, skill_id: &str, user_id: &str) -> Option<PermissionGrant> {
        let grants = self.grants.read().await;
        grants
            .get(user_id)?
            .iter()
            .find(|g| g.skill_id == skill_id)
            .cloned()
    }

    /// Skill ids from `skills` that the given role/tier combination can
    /// access by default (grants are user-specific and not considered).
    pub fn accessible_skills(skills: &[Skill], role: Role, tier: Tier) -> Vec<String> {
        skills
            .iter()
            .filter(|s| s.allows_role(role) && s.allows_tier(tier))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Audit-level and retention requirements for a skill.
    pub fn audit_requirements(skill: &Skill) -> AuditRequirements {
        AuditRequirements::for_level(skill.audit_level)
    }

    /// Flattened snapshot of all grants across all users, sorted by
    /// `(skill_id, user_id)` for stable output.
    pub async fn snapshot(&self) -> Vec<PermissionGrant> {
        let grants = self.grants.read().await;
        let mut all: Vec<PermissionGrant> = grants.values().flatten().cloned().collect();
        all.sort_by(|a, b| (&a.skill_id, &a.user_id).cmp(&(&b.skill_id, &b.user_id)));
        all
    }

    /// Re-install a persisted grant at startup.
    pub async fn restore(&self, grant: PermissionGrant) {
        self.grant(grant).await;
    }
}
