//! Skill registry: the source of truth for "what exists".
//!
//! Owns the catalog of [`Skill`] records. Mutations are serialized through a
//! single writer lock; reads proceed concurrently. Audit, persistence, and
//! event emission around these mutations are the orchestrator's job -- the
//! registry itself stays pure catalog logic.

use std::collections::HashMap;

use tokio::sync::RwLock;

use skillgate_types::error::RegistryError;
use skillgate_types::skill::{Skill, SkillCategory, SkillPatch, Tier};

/// Validate a skill's metadata, collecting every failure reason.
///
/// Category, version, and audit level are closed types, so only the
/// free-form fields need checking here.
pub fn validate(skill: &Skill) -> Vec<String> {
    let mut reasons = Vec::new();
    if skill.id.trim().is_empty() {
        reasons.push("id must not be empty".to_string());
    }
    if skill.name.trim().is_empty() {
        reasons.push("name must not be empty".to_string());
    }
    if skill.execution_contexts.is_empty() {
        reasons.push("at least one execution context is required".to_string());
    }
    reasons
}

/// In-memory catalog of registered skills.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: RwLock<HashMap<String, Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new skill.
    ///
    /// Fails with [`RegistryError::Validation`] on malformed metadata and
    /// [`RegistryError::Conflict`] on a duplicate id; neither mutates
    /// existing state.
    pub async fn register(&self, skill: Skill) -> Result<Skill, RegistryError> {
        let reasons = validate(&skill);
        if !reasons.is_empty() {
            return Err(RegistryError::Validation(reasons));
        }

        let mut skills = self.skills.write().await;
        if skills.contains_key(&skill.id) {
            return Err(RegistryError::Conflict(skill.id));
        }
        skills.insert(skill.id.clone(), skill.clone());
        Ok(skill)
    }

    /// Remove a skill, returning the removed record.
    pub async fn unregister(&self, id: &str) -> Result<Skill, RegistryError> {
        let mut skills = self.skills.write().await;
        skills
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub async fn get(&self, id: &str) -> Option<Skill> {
        self.skills.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.skills.read().await.contains_key(id)
    }

    /// List skills, optionally filtered by category and by tier visibility.
    ///
    /// Results are sorted by id for stable output.
    pub async fn list(&self, category: Option<SkillCategory>, tier: Option<Tier>) -> Vec<Skill> {
        let skills = self.skills.read().await;
        let mut result: Vec<Skill> = skills
            .values()
            .filter(|s| category.is_none_or(|c| s.category == c))
            .filter(|s| tier.is_none_or(|t| s.allows_tier(t)))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Merge a partial patch into an existing skill, stamping `last_updated`.
    /// Returns the updated record.
    pub async fn update(&self, id: &str, patch: &SkillPatch) -> Result<Skill, RegistryError> {
        let mut skills = self.skills.write().await;
        let skill = skills
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        patch.apply(skill);
        Ok(skill.clone())
    }

    /// Snapshot of the full catalog, sorted by id.
    pub async fn snapshot(&self) -> Vec<Skill> {
        let skills = self.skills.read().await;
        let mut result: Vec<Skill> = skills.values().cloned().collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Insert a persisted skill directly, bypassing validation. Used when
    /// restoring a snapshot at startup.
    pub async fn restore(&self, skill: Skill) {
        self.skills.write().await.insert(skill.id.clone(), skill);
    }
}
