//! Persistence port.
//!
//! [`SkillStore`] is the durable-snapshot interface the orchestrator writes
//! through on every mutating operation. The concrete SQLite implementation
//! lives in `skillgate-infra`; tests use an in-memory stub. Uses RPITIT for
//! async methods.
//!
//! Persistence is best-effort by design: a write failure is logged and
//! counted, but the in-memory mutation is authoritative and is never rolled
//! back.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use skillgate_types::audit::AuditEntry;
use skillgate_types::error::StoreError;
use skillgate_types::permission::PermissionGrant;
use skillgate_types::skill::Skill;

/// Durable storage for skills, permission grants, and the audit trail.
pub trait SkillStore: Send + Sync {
    fn upsert_skill(&self, skill: &Skill) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_skill(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_skills(&self) -> impl Future<Output = Result<Vec<Skill>, StoreError>> + Send;

    fn upsert_grant(
        &self,
        grant: &PermissionGrant,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_grant(
        &self,
        skill_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_grants(&self) -> impl Future<Output = Result<Vec<PermissionGrant>, StoreError>> + Send;

    fn append_audit(
        &self,
        entry: &AuditEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The `limit` most recent audit entries, oldest first.
    fn load_audit(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, StoreError>> + Send;

    /// Release underlying resources (connection pools). Called once at
    /// orchestrator shutdown.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Counts persistence write failures so callers can observe durability risk
/// without mutating-operation results being affected.
#[derive(Debug, Default)]
pub struct PersistenceHealth {
    failures: AtomicU64,
}

impl PersistenceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total snapshot writes that failed since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Non-durable [`SkillStore`] backed by plain vectors.
///
/// Used in tests and by callers that explicitly opt out of durability.
/// Everything is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    skills: std::sync::Mutex<Vec<Skill>>,
    grants: std::sync::Mutex<Vec<PermissionGrant>>,
    audit: std::sync::Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SkillStore for MemoryStore {
    async fn upsert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        let mut skills = self.skills.lock().expect("memory store lock poisoned");
        skills.retain(|s| s.id != skill.id);
        skills.push(skill.clone());
        Ok(())
    }

    async fn remove_skill(&self, id: &str) -> Result<(), StoreError> {
        let mut skills = self.skills.lock().expect("memory store lock poisoned");
        skills.retain(|s| s.id != id);
        Ok(())
    }

    async fn load_skills(&self) -> Result<Vec<Skill>, StoreError> {
        Ok(self.skills.lock().expect("memory store lock poisoned").clone())
    }

    async fn upsert_grant(&self, grant: &PermissionGrant) -> Result<(), StoreError> {
        let mut grants = self.grants.lock().expect("memory store lock poisoned");
        grants.retain(|g| !(g.skill_id == grant.skill_id && g.user_id == grant.user_id));
        grants.push(grant.clone());
        Ok(())
    }

    async fn remove_grant(&self, skill_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut grants = self.grants.lock().expect("memory store lock poisoned");
        grants.retain(|g| !(g.skill_id == skill_id && g.user_id == user_id));
        Ok(())
    }

    async fn load_grants(&self) -> Result<Vec<PermissionGrant>, StoreError> {
        Ok(self.grants.lock().expect("memory store lock poisoned").clone())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.audit
            .lock()
            .expect("memory store lock poisoned")
            .push(entry.clone());
        Ok(())
    }

    async fn load_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let audit = self.audit.lock().expect("memory store lock poisoned");
        let start = audit.len().saturating_sub(limit);
        Ok(audit[start..].to_vec())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_health_counts_failures() {
        let health = PersistenceHealth::new();
        assert_eq!(health.failure_count(), 0);
        health.record_failure();
        health.record_failure();
        assert_eq!(health.failure_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_upsert_replaces_by_id() {
        use chrono::Utc;
        use skillgate_types::skill::{
            AuditLevel, ExecutionContext, PermissionFlags, ResourceLimits, SkillCategory,
        };
        use std::collections::BTreeSet;

        let store = MemoryStore::new();
        let mut skill = Skill {
            id: "audio-processor".to_string(),
            name: "Audio Processor".to_string(),
            version: semver::Version::new(1, 0, 0),
            category: SkillCategory::Audio,
            execution_contexts: BTreeSet::from([ExecutionContext::Api]),
            resource_limits: ResourceLimits::default(),
            permission_flags: PermissionFlags::default(),
            audit_level: AuditLevel::Minimal,
            last_updated: Utc::now(),
        };

        store.upsert_skill(&skill).await.unwrap();
        skill.name = "Renamed".to_string();
        store.upsert_skill(&skill).await.unwrap();

        let skills = store.load_skills().await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "Renamed");

        store.remove_skill("audio-processor").await.unwrap();
        assert!(store.load_skills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_audit_load_respects_limit() {
        use skillgate_types::audit::AuditEventLevel;

        let store = MemoryStore::new();
        for n in 0..5 {
            let entry = AuditEntry::new(
                AuditEventLevel::Info,
                "test",
                None,
                None,
                format!("entry {n}"),
            );
            store.append_audit(&entry).await.unwrap();
        }

        let loaded = store.load_audit(2).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].details, "entry 3");
        assert_eq!(loaded[1].details, "entry 4");
    }
}
