//! Per-skill resource usage tracking.
//!
//! Bookkeeping consumed by the execution engine and analytics. One
//! [`ResourceUsage`] cell per skill, updated under its own DashMap entry
//! lock.

use dashmap::DashMap;

use skillgate_types::execution::ResourcesUsed;
use skillgate_types::resource::ResourceUsage;
use skillgate_types::skill::ResourceLimits;

/// Tracks memory/CPU/network aggregates per registered skill.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    usage: DashMap<String, ResourceUsage>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a zeroed cell with the skill's declared limits.
    pub fn init(&self, skill_id: &str, limits: ResourceLimits) {
        self.usage
            .insert(skill_id.to_string(), ResourceUsage::new(skill_id, limits));
    }

    pub fn remove(&self, skill_id: &str) {
        self.usage.remove(skill_id);
    }

    pub fn get(&self, skill_id: &str) -> Option<ResourceUsage> {
        self.usage.get(skill_id).map(|u| u.clone())
    }

    /// All tracked usage, sorted by skill id.
    pub fn all(&self) -> Vec<ResourceUsage> {
        let mut all: Vec<ResourceUsage> = self.usage.iter().map(|u| u.clone()).collect();
        all.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
        all
    }

    /// Fold one execution's measurements into the skill's aggregates.
    pub fn record(&self, skill_id: &str, used: &ResourcesUsed, network_bytes: u64) {
        if let Some(mut usage) = self.usage.get_mut(skill_id) {
            usage.record(used, network_bytes);
        }
    }
}
