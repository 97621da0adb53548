//! Top-level orchestrator facade.
//!
//! An explicitly constructed instance with a documented init/shutdown
//! lifecycle -- callers hold it by reference or inject it; there is no
//! ambient global state. Every mutating operation writes at least one audit
//! entry, persists the affected collection best-effort, and publishes a
//! domain event.

use std::sync::Arc;

use skillgate_types::audit::{AuditEntry, AuditEventLevel};
use skillgate_types::config::OrchestratorConfig;
use skillgate_types::error::{PolicyError, RegistryError, StoreError};
use skillgate_types::event::SkillEvent;
use skillgate_types::execution::{ExecutionRequest, ExecutionResult};
use skillgate_types::health::HealthStatus;
use skillgate_types::permission::{AuditRequirements, Decision, PermissionGrant};
use skillgate_types::resource::ResourceUsage;
use skillgate_types::skill::{
    ExecutionContext, Role, Skill, SkillCategory, SkillPatch, Tier,
};
use tokio::sync::broadcast;

use crate::analytics::{self, SkillAnalytics};
use crate::audit::AuditLog;
use crate::engine::ExecutionEngine;
use crate::event::EventBus;
use crate::hash::ContentHasher;
use crate::health::HealthMonitor;
use crate::policy::PolicyEngine;
use crate::registry::SkillRegistry;
use crate::resource::ResourceTracker;
use crate::sandbox::ExecutionSandbox;
use crate::store::{PersistenceHealth, SkillStore};

/// The governed skill execution orchestrator.
///
/// Owns the registry, policy engine, execution engine, health monitor,
/// resource tracker, audit log, and event bus. Construct with
/// [`Orchestrator::new`], restore persisted state with
/// [`Orchestrator::load`], and release resources with
/// [`Orchestrator::shutdown`].
pub struct Orchestrator<S, X> {
    registry: Arc<SkillRegistry>,
    policy: Arc<PolicyEngine>,
    health: Arc<HealthMonitor>,
    resources: Arc<ResourceTracker>,
    audit: Arc<AuditLog>,
    bus: EventBus,
    store: Arc<S>,
    persistence: Arc<PersistenceHealth>,
    engine: ExecutionEngine<S, X>,
    audit_retain: usize,
}

impl<S, X> Orchestrator<S, X>
where
    S: SkillStore,
    X: ExecutionSandbox,
{
    pub fn new(
        config: &OrchestratorConfig,
        store: S,
        sandbox: X,
        hasher: Arc<dyn ContentHasher>,
    ) -> Self {
        let registry = Arc::new(SkillRegistry::new());
        let policy = Arc::new(PolicyEngine::new());
        let health = Arc::new(HealthMonitor::new());
        let resources = Arc::new(ResourceTracker::new());
        let audit = Arc::new(AuditLog::new(config.audit_cap, config.audit_retain));
        let bus = EventBus::new(config.event_capacity);
        let store = Arc::new(store);
        let persistence = Arc::new(PersistenceHealth::new());

        let engine = ExecutionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&policy),
            Arc::clone(&health),
            Arc::clone(&resources),
            Arc::clone(&audit),
            bus.clone(),
            Arc::clone(&store),
            Arc::new(sandbox),
            hasher,
            Arc::clone(&persistence),
            config.history_cap,
        );

        Self {
            registry,
            policy,
            health,
            resources,
            audit,
            bus,
            store,
            persistence,
            engine,
            audit_retain: config.audit_retain,
        }
    }

    /// Restore skills, grants, and the audit tail from the store.
    ///
    /// Unlike the best-effort snapshot writes, a load failure surfaces to
    /// the caller: starting from a partial snapshot is worse than not
    /// starting.
    pub async fn load(&self) -> Result<(), StoreError> {
        let skills = self.store.load_skills().await?;
        let skill_count = skills.len();
        for skill in skills {
            self.health.init(&skill.id);
            self.resources.init(&skill.id, skill.resource_limits);
            self.registry.restore(skill).await;
        }

        let grants = self.store.load_grants().await?;
        let grant_count = grants.len();
        for grant in grants {
            self.policy.restore(grant).await;
        }

        let audit = self.store.load_audit(self.audit_retain).await?;
        self.audit.restore(audit);

        tracing::info!(skills = skill_count, grants = grant_count, "orchestrator state restored");
        Ok(())
    }

    /// Release the store's underlying resources. The orchestrator must not
    /// be used after shutdown.
    pub async fn shutdown(&self) {
        self.store.close().await;
        tracing::info!("orchestrator shut down");
    }

    // -----------------------------------------------------------------
    // Registry operations
    // -----------------------------------------------------------------

    /// Register a new skill.
    ///
    /// Validation and conflict failures are returned without any state
    /// change or audit entry; the error itself is the caller's
    /// validation-failure signal.
    pub async fn register_skill(&self, skill: Skill) -> Result<Skill, RegistryError> {
        let skill = self.registry.register(skill).await?;

        self.health.init(&skill.id);
        self.resources.init(&skill.id, skill.resource_limits);
        self.persist(self.store.upsert_skill(&skill).await, "skill upsert");

        let entry = self.audit.record(
            AuditEventLevel::Info,
            "skill_registered",
            None,
            Some(&skill.id),
            format!("registered '{}' v{} ({})", skill.name, skill.version, skill.category),
        );
        self.persist_audit(&entry).await;

        self.bus.publish(SkillEvent::SkillRegistered {
            skill_id: skill.id.clone(),
            category: skill.category,
            version: skill.version.clone(),
        });
        Ok(skill)
    }

    /// Remove a skill and its health/resource trackers and history.
    ///
    /// Unregistering an unknown id is a no-op: it changes no state and
    /// writes no audit entry beyond a debug log.
    pub async fn unregister_skill(&self, id: &str) -> Result<(), RegistryError> {
        let skill = match self.registry.unregister(id).await {
            Ok(skill) => skill,
            Err(err) => {
                tracing::debug!(skill = %id, "unregister of unknown skill is a no-op");
                return Err(err);
            }
        };

        self.health.remove(id);
        self.resources.remove(id);
        self.engine.clear_history(id);
        self.persist(self.store.remove_skill(id).await, "skill removal");

        let entry = self.audit.record(
            AuditEventLevel::Info,
            "skill_unregistered",
            None,
            Some(id),
            format!("unregistered '{}'", skill.name),
        );
        self.persist_audit(&entry).await;

        self.bus.publish(SkillEvent::SkillUnregistered {
            skill_id: id.to_string(),
        });
        Ok(())
    }

    pub async fn get_skill(&self, id: &str) -> Option<Skill> {
        self.registry.get(id).await
    }

    pub async fn list_skills(
        &self,
        category: Option<SkillCategory>,
        tier: Option<Tier>,
    ) -> Vec<Skill> {
        self.registry.list(category, tier).await
    }

    /// Merge a partial patch into a skill.
    pub async fn update_skill(&self, id: &str, patch: &SkillPatch) -> Result<Skill, RegistryError> {
        let skill = self.registry.update(id, patch).await?;

        // Limits may have changed; resource cells carry the skill's limits.
        if patch.resource_limits.is_some() {
            self.resources.init(id, skill.resource_limits);
        }
        self.persist(self.store.upsert_skill(&skill).await, "skill upsert");

        let entry = self.audit.record(
            AuditEventLevel::Info,
            "skill_updated",
            None,
            Some(id),
            format!("updated '{}' to v{}", skill.name, skill.version),
        );
        self.persist_audit(&entry).await;

        self.bus.publish(SkillEvent::SkillUpdated {
            skill_id: id.to_string(),
        });
        Ok(skill)
    }

    // -----------------------------------------------------------------
    // Permission operations
    // -----------------------------------------------------------------

    /// Full permission check for a `(skill, user, role, tier, context)`
    /// combination. An unknown skill yields a denial, not an error.
    pub async fn check_permission(
        &self,
        skill_id: &str,
        user_id: &str,
        role: Role,
        tier: Tier,
        context: ExecutionContext,
    ) -> Decision {
        match self.registry.get(skill_id).await {
            Some(skill) => {
                self.policy
                    .can_execute(&skill, user_id, role, tier, context)
                    .await
            }
            None => Decision::deny(format!("skill '{skill_id}' not found")),
        }
    }

    /// Install a per-user override grant. The skill must exist.
    pub async fn grant_permission(&self, grant: PermissionGrant) -> Result<(), PolicyError> {
        if !self.registry.contains(&grant.skill_id).await {
            return Err(PolicyError::SkillNotFound(grant.skill_id));
        }

        let skill_id = grant.skill_id.clone();
        let user_id = grant.user_id.clone();
        let granted_by = grant.granted_by.clone();
        let permissions = grant
            .granted_permissions
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        self.policy.grant(grant.clone()).await;
        self.persist(self.store.upsert_grant(&grant).await, "grant upsert");

        let entry = self.audit.record(
            AuditEventLevel::Info,
            "permission_granted",
            Some(&user_id),
            Some(&skill_id),
            format!("granted [{permissions}] by {granted_by}"),
        );
        self.persist_audit(&entry).await;

        self.bus.publish(SkillEvent::PermissionGranted {
            skill_id,
            user_id,
            granted_by,
        });
        Ok(())
    }

    /// Remove a per-user override grant.
    pub async fn revoke_permission(
        &self,
        skill_id: &str,
        user_id: &str,
    ) -> Result<(), PolicyError> {
        self.policy.revoke(skill_id, user_id).await?;
        self.persist(
            self.store.remove_grant(skill_id, user_id).await,
            "grant removal",
        );

        let entry = self.audit.record(
            AuditEventLevel::Info,
            "permission_revoked",
            Some(user_id),
            Some(skill_id),
            "grant revoked",
        );
        self.persist_audit(&entry).await;

        self.bus.publish(SkillEvent::PermissionRevoked {
            skill_id: skill_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    /// Skill ids the given role/tier can access by default.
    pub async fn accessible_skills(&self, role: Role, tier: Tier) -> Vec<String> {
        let skills = self.registry.snapshot().await;
        PolicyEngine::accessible_skills(&skills, role, tier)
    }

    /// Audit-level and retention requirements for a skill.
    pub async fn audit_requirements(&self, skill_id: &str) -> Option<AuditRequirements> {
        let skill = self.registry.get(skill_id).await?;
        Some(PolicyEngine::audit_requirements(&skill))
    }

    // -----------------------------------------------------------------
    // Execution and derived views
    // -----------------------------------------------------------------

    /// Execute one request through the engine.
    pub async fn execute_skill(&self, request: ExecutionRequest) -> ExecutionResult {
        self.engine.execute(request).await
    }

    /// A skill's bounded execution history, optionally filtered by user.
    pub fn execution_history(
        &self,
        skill_id: &str,
        user_id: Option<&str>,
    ) -> Vec<ExecutionResult> {
        self.engine.history(skill_id, user_id)
    }

    pub fn skill_health(&self, skill_id: &str) -> Option<HealthStatus> {
        self.health.get(skill_id)
    }

    pub fn all_health(&self) -> Vec<HealthStatus> {
        self.health.all()
    }

    pub fn skill_resources(&self, skill_id: &str) -> Option<ResourceUsage> {
        self.resources.get(skill_id)
    }

    pub fn all_resources(&self) -> Vec<ResourceUsage> {
        self.resources.all()
    }

    /// Usage/error/performance summary over a skill's history window.
    pub fn skill_analytics(&self, skill_id: &str) -> SkillAnalytics {
        let history = self.engine.history(skill_id, None);
        analytics::summarize(skill_id, &history)
    }

    /// The most recent audit entries, oldest first.
    pub fn recent_audit(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit)
    }

    /// Subscribe to domain events.
    pub fn subscribe(&self) -> broadcast::Receiver<SkillEvent> {
        self.bus.subscribe()
    }

    /// Number of best-effort snapshot writes that have failed since
    /// startup. In-memory state is authoritative; this is the durability
    /// risk signal.
    pub fn persistence_failures(&self) -> u64 {
        self.persistence.failure_count()
    }

    // -----------------------------------------------------------------
    // Snapshot accessors (JSON export, diagnostics)
    // -----------------------------------------------------------------

    pub async fn skills_snapshot(&self) -> Vec<Skill> {
        self.registry.snapshot().await
    }

    pub async fn grants_snapshot(&self) -> Vec<PermissionGrant> {
        self.policy.snapshot().await
    }

    pub fn audit_snapshot(&self) -> Vec<AuditEntry> {
        self.audit.snapshot()
    }

    fn persist(&self, result: Result<(), StoreError>, what: &str) {
        if let Err(err) = result {
            self.persistence.record_failure();
            tracing::warn!(error = %err, "failed to persist {what}; in-memory state is authoritative");
        }
    }

    async fn persist_audit(&self, entry: &AuditEntry) {
        self.persist(self.store.append_audit(entry).await, "audit entry");
    }
}
