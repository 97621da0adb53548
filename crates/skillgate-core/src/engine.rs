//! Execution engine: the hub of every invocation.
//!
//! Drives the per-skill lifecycle for a single request: permission check,
//! context validation, health/resource bookkeeping, sandbox dispatch under a
//! deadline, result recording, audit emission, and domain events. Permission
//! denials and unknown skills return a failed result immediately and never
//! touch health or resources.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use skillgate_types::audit::AuditEventLevel;
use skillgate_types::execution::{ExecutionRequest, ExecutionResult, ResourcesUsed};
use skillgate_types::event::SkillEvent;
use skillgate_types::skill::Skill;

use crate::audit::AuditLog;
use crate::event::EventBus;
use crate::hash::ContentHasher;
use crate::health::HealthMonitor;
use crate::policy::PolicyEngine;
use crate::registry::SkillRegistry;
use crate::resource::ResourceTracker;
use crate::sandbox::{ExecutionSandbox, SandboxOutcome};
use crate::store::{PersistenceHealth, SkillStore};

/// Fraction of the declared memory limit reported when the sandbox does not
/// measure memory.
const SIMULATED_MEMORY_FRACTION: f64 = 0.25;
/// Fraction of the declared CPU limit reported when the sandbox does not
/// measure CPU.
const SIMULATED_CPU_FRACTION: f64 = 0.5;

/// Orchestrates single invocations against the sandbox.
///
/// Executions for different skills are fully independent; executions for the
/// same skill may run concurrently, with health/resource counters updated
/// atomically under per-skill locks.
pub struct ExecutionEngine<S, X> {
    registry: Arc<SkillRegistry>,
    policy: Arc<PolicyEngine>,
    health: Arc<HealthMonitor>,
    resources: Arc<ResourceTracker>,
    audit: Arc<AuditLog>,
    bus: EventBus,
    store: Arc<S>,
    sandbox: Arc<X>,
    hasher: Arc<dyn ContentHasher>,
    persistence: Arc<PersistenceHealth>,
    history: DashMap<String, VecDeque<ExecutionResult>>,
    history_cap: usize,
}

impl<S, X> ExecutionEngine<S, X>
where
    S: SkillStore,
    X: ExecutionSandbox,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SkillRegistry>,
        policy: Arc<PolicyEngine>,
        health: Arc<HealthMonitor>,
        resources: Arc<ResourceTracker>,
        audit: Arc<AuditLog>,
        bus: EventBus,
        store: Arc<S>,
        sandbox: Arc<X>,
        hasher: Arc<dyn ContentHasher>,
        persistence: Arc<PersistenceHealth>,
        history_cap: usize,
    ) -> Self {
        Self {
            registry,
            policy,
            health,
            resources,
            audit,
            bus,
            store,
            sandbox,
            hasher,
            persistence,
            history: DashMap::new(),
            history_cap,
        }
    }

    /// Execute one request end to end. Never returns an error across the
    /// API boundary: every failure mode is folded into a failed
    /// [`ExecutionResult`].
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        // 1+2. The skill must exist; permission and context checks need its
        // declared flags and contexts.
        let Some(skill) = self.registry.get(&request.skill_id).await else {
            let reason = format!("skill '{}' not found", request.skill_id);
            return self.reject(&request, AuditEventLevel::Warning, &reason).await;
        };

        let decision = self
            .policy
            .can_execute(
                &skill,
                &request.user_id,
                request.role,
                request.tier,
                request.context,
            )
            .await;
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "permission denied".to_string());
            return self.reject(&request, AuditEventLevel::Warning, &reason).await;
        }
        let mut audit_ids = Vec::new();
        if decision.via_grant {
            // Break-glass: a per-user grant flipped a tier-default denial.
            let entry = self.audit.record(
                AuditEventLevel::Security,
                "permission_override_used",
                Some(&request.user_id),
                Some(&skill.id),
                format!(
                    "grant override allowed tier {} for skill {}",
                    request.tier, skill.id
                ),
            );
            self.persist_audit(&entry).await;
            audit_ids.push(entry.id);
        }

        // 3. Mark executing before dispatch.
        self.health.mark_executing(&skill.id);

        // 4. Dispatch under the skill's declared deadline.
        let deadline = Duration::from_millis(skill.resource_limits.timeout_ms);
        let started = Instant::now();
        let dispatched = tokio::time::timeout(
            deadline,
            self.sandbox.dispatch(&skill, &request),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // 5+6. Record the outcome, update health, audit, and emit events.
        match dispatched {
            Ok(Ok(outcome)) => {
                self.complete_success(&skill, &request, outcome, elapsed_ms, audit_ids)
                    .await
            }
            Ok(Err(err)) => {
                self.complete_failure(&skill, &request, err.to_string(), elapsed_ms, audit_ids)
                    .await
            }
            Err(_) => {
                let error = format!(
                    "execution timed out after {}ms",
                    skill.resource_limits.timeout_ms
                );
                self.complete_failure(&skill, &request, error, elapsed_ms, audit_ids)
                    .await
            }
        }
    }

    /// Per-skill execution history, newest last, optionally filtered by
    /// user.
    pub fn history(&self, skill_id: &str, user_id: Option<&str>) -> Vec<ExecutionResult> {
        match self.history.get(skill_id) {
            Some(ring) => ring
                .iter()
                .filter(|r| user_id.is_none_or(|u| r.user_id == u))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Drop the execution history for an unregistered skill.
    pub fn clear_history(&self, skill_id: &str) {
        self.history.remove(skill_id);
    }

    async fn complete_success(
        &self,
        skill: &Skill,
        request: &ExecutionRequest,
        outcome: SandboxOutcome,
        elapsed_ms: u64,
        mut audit_ids: Vec<uuid::Uuid>,
    ) -> ExecutionResult {
        let resources_used = ResourcesUsed {
            memory_mb: outcome
                .memory_mb
                .unwrap_or(skill.resource_limits.memory_mb as f64 * SIMULATED_MEMORY_FRACTION),
            cpu_percent: outcome
                .cpu_percent
                .unwrap_or(skill.resource_limits.cpu_percent as f64 * SIMULATED_CPU_FRACTION),
            duration_ms: elapsed_ms,
        };

        self.health.record_success(&skill.id, elapsed_ms);
        self.resources
            .record(&skill.id, &resources_used, outcome.network_bytes.unwrap_or(0));

        let input_hash = self.hasher.compute_hash(&request.parameters.to_string());
        let entry = skillgate_types::audit::AuditEntry::new(
            AuditEventLevel::Info,
            "skill_executed",
            Some(request.user_id.clone()),
            Some(skill.id.clone()),
            format!(
                "executed in {elapsed_ms}ms (audit level {})",
                skill.audit_level
            ),
        )
        .with_input_hash(input_hash);
        self.audit.append(entry.clone());
        self.persist_audit(&entry).await;
        audit_ids.push(entry.id);

        let result = ExecutionResult {
            success: true,
            skill_id: skill.id.clone(),
            request_id: request.request_id,
            user_id: request.user_id.clone(),
            output: Some(outcome.output),
            error: None,
            execution_time_ms: elapsed_ms,
            resources_used,
            audit_ids,
            completed_at: chrono::Utc::now(),
        };
        self.push_history(result.clone());

        tracing::debug!(
            skill = %skill.id,
            request_id = %request.request_id,
            elapsed_ms,
            "skill executed"
        );
        self.bus.publish(SkillEvent::SkillExecuted {
            skill_id: skill.id.clone(),
            request_id: request.request_id,
            user_id: request.user_id.clone(),
            execution_time_ms: elapsed_ms,
        });
        result
    }

    async fn complete_failure(
        &self,
        skill: &Skill,
        request: &ExecutionRequest,
        error: String,
        elapsed_ms: u64,
        mut audit_ids: Vec<uuid::Uuid>,
    ) -> ExecutionResult {
        let resources_used = ResourcesUsed {
            memory_mb: 0.0,
            cpu_percent: 0.0,
            duration_ms: elapsed_ms,
        };

        self.health.record_failure(&skill.id, elapsed_ms);
        self.resources.record(&skill.id, &resources_used, 0);

        let input_hash = self.hasher.compute_hash(&request.parameters.to_string());
        let entry = skillgate_types::audit::AuditEntry::new(
            AuditEventLevel::Critical,
            "skill_execution_failed",
            Some(request.user_id.clone()),
            Some(skill.id.clone()),
            format!("failed after {elapsed_ms}ms: {error}"),
        )
        .with_input_hash(input_hash);
        self.audit.append(entry.clone());
        self.persist_audit(&entry).await;
        audit_ids.push(entry.id);

        let result = ExecutionResult {
            success: false,
            skill_id: skill.id.clone(),
            request_id: request.request_id,
            user_id: request.user_id.clone(),
            output: None,
            error: Some(error.clone()),
            execution_time_ms: elapsed_ms,
            resources_used,
            audit_ids,
            completed_at: chrono::Utc::now(),
        };
        self.push_history(result.clone());

        tracing::warn!(
            skill = %skill.id,
            request_id = %request.request_id,
            error = %error,
            "skill execution failed"
        );
        self.bus.publish(SkillEvent::SkillExecutionFailed {
            skill_id: skill.id.clone(),
            request_id: request.request_id,
            user_id: request.user_id.clone(),
            error,
        });
        result
    }

    /// A rejection before dispatch: one audit entry, no health or resource
    /// mutation, no history entry, no domain event.
    async fn reject(
        &self,
        request: &ExecutionRequest,
        level: AuditEventLevel,
        reason: &str,
    ) -> ExecutionResult {
        let entry = self.audit.record(
            level,
            "skill_execution_denied",
            Some(&request.user_id),
            Some(&request.skill_id),
            reason,
        );
        self.persist_audit(&entry).await;

        tracing::debug!(
            skill = %request.skill_id,
            user = %request.user_id,
            reason = %reason,
            "execution rejected"
        );
        let mut result = ExecutionResult::rejected(request, reason);
        result.audit_ids.push(entry.id);
        result
    }

    fn push_history(&self, result: ExecutionResult) {
        // A zero capacity disables history entirely.
        if self.history_cap == 0 {
            return;
        }
        let mut ring = self.history.entry(result.skill_id.clone()).or_default();
        while ring.len() >= self.history_cap {
            ring.pop_front();
        }
        ring.push_back(result);
    }

    async fn persist_audit(&self, entry: &skillgate_types::audit::AuditEntry) {
        if let Err(err) = self.store.append_audit(entry).await {
            self.persistence.record_failure();
            tracing::warn!(error = %err, "failed to persist audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::hash::NoopHasher;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use skillgate_types::health::SkillStatus;
    use skillgate_types::skill::{
        AuditLevel, ExecutionContext, PermissionFlags, ResourceLimits, Role, SkillCategory, Tier,
    };
    use std::collections::BTreeSet;

    /// Sandbox that fails when the parameters contain `"fail": true`, and
    /// sleeps when they contain a `"sleep_ms"` figure.
    struct ScriptedSandbox;

    impl ExecutionSandbox for ScriptedSandbox {
        async fn dispatch(
            &self,
            _skill: &Skill,
            request: &ExecutionRequest,
        ) -> anyhow::Result<SandboxOutcome> {
            if let Some(ms) = request.parameters.get("sleep_ms").and_then(|v| v.as_u64()) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if request
                .parameters
                .get("fail")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                anyhow::bail!("scripted failure");
            }
            Ok(SandboxOutcome::output_only(serde_json::json!({"ok": true})))
        }
    }

    struct Harness {
        registry: Arc<SkillRegistry>,
        policy: Arc<PolicyEngine>,
        health: Arc<HealthMonitor>,
        resources: Arc<ResourceTracker>,
        audit: Arc<AuditLog>,
        bus: EventBus,
        engine: ExecutionEngine<MemoryStore, ScriptedSandbox>,
    }

    fn harness() -> Harness {
        harness_with_history_cap(8)
    }

    fn harness_with_history_cap(history_cap: usize) -> Harness {
        let registry = Arc::new(SkillRegistry::new());
        let policy = Arc::new(PolicyEngine::new());
        let health = Arc::new(HealthMonitor::new());
        let resources = Arc::new(ResourceTracker::new());
        let audit = Arc::new(AuditLog::default());
        let bus = EventBus::new(64);
        let engine = ExecutionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&policy),
            Arc::clone(&health),
            Arc::clone(&resources),
            Arc::clone(&audit),
            bus.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedSandbox),
            Arc::new(NoopHasher),
            Arc::new(PersistenceHealth::new()),
            history_cap,
        );
        Harness {
            registry,
            policy,
            health,
            resources,
            audit,
            bus,
            engine,
        }
    }

    fn make_skill(id: &str, timeout_ms: u64) -> Skill {
        Skill {
            id: id.to_string(),
            name: format!("Skill {id}"),
            version: semver::Version::new(1, 0, 0),
            category: SkillCategory::Audio,
            execution_contexts: BTreeSet::from([ExecutionContext::Api]),
            resource_limits: ResourceLimits {
                timeout_ms,
                ..Default::default()
            },
            permission_flags: PermissionFlags {
                user: true,
                ..Default::default()
            },
            audit_level: AuditLevel::Standard,
            last_updated: Utc::now(),
        }
    }

    async fn seed(h: &Harness, skill: Skill) {
        h.health.init(&skill.id);
        h.resources.init(&skill.id, skill.resource_limits);
        h.registry.register(skill).await.unwrap();
    }

    fn make_request(skill_id: &str, tier: Tier, parameters: serde_json::Value) -> ExecutionRequest {
        ExecutionRequest::new(skill_id, "user-1", Role::User, tier, ExecutionContext::Api, parameters)
    }

    #[tokio::test]
    async fn successful_execution_keeps_skill_healthy() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;

        let result = h
            .engine
            .execute(make_request("audio-processor", Tier::Free, serde_json::json!({})))
            .await;

        assert!(result.success);
        assert_eq!(result.output.unwrap()["ok"], true);
        assert!(!result.audit_ids.is_empty());

        let health = h.health.get("audio-processor").unwrap();
        assert_eq!(health.status, SkillStatus::Healthy);
        assert_eq!(health.total_executions, 1);

        let usage = h.resources.get("audio-processor").unwrap();
        assert_eq!(usage.samples, 1);
        // Simulated figures derived from the declared limits.
        assert!(usage.memory.peak_mb > 0.0);
    }

    #[tokio::test]
    async fn sandbox_error_degrades_health_and_audits_critical() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;

        let result = h
            .engine
            .execute(make_request(
                "audio-processor",
                Tier::Free,
                serde_json::json!({"fail": true}),
            ))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("scripted failure"));

        let health = h.health.get("audio-processor").unwrap();
        assert_eq!(health.status, SkillStatus::Failed);
        assert_eq!(health.consecutive_failures, 1);
        assert!((health.error_rate - 0.1).abs() < 1e-9);

        let critical: Vec<_> = h
            .audit
            .for_skill("audio-processor")
            .into_iter()
            .filter(|e| e.level == AuditEventLevel::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
    }

    #[tokio::test]
    async fn timeout_is_treated_as_failure() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 20)).await;

        let result = h
            .engine
            .execute(make_request(
                "audio-processor",
                Tier::Free,
                serde_json::json!({"sleep_ms": 200}),
            ))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out after 20ms"));

        let health = h.health.get("audio-processor").unwrap();
        assert_eq!(health.status, SkillStatus::Failed);
        assert_eq!(health.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn permission_denial_does_not_touch_health_or_resources() {
        let h = harness();
        let mut skill = make_skill("audio-processor", 5_000);
        // admin-only: free tier denied
        skill.permission_flags = PermissionFlags {
            admin: true,
            ..Default::default()
        };
        seed(&h, skill).await;

        let request = ExecutionRequest::new(
            "audio-processor",
            "user-1",
            Role::Admin,
            Tier::Free,
            ExecutionContext::Api,
            serde_json::json!({}),
        );
        let result = h.engine.execute(request).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not allowed"));

        let health = h.health.get("audio-processor").unwrap();
        assert_eq!(health.total_executions, 0);
        assert_eq!(health.status, SkillStatus::Healthy);
        assert_eq!(h.resources.get("audio-processor").unwrap().samples, 0);
        assert!(h.engine.history("audio-processor", None).is_empty());
    }

    #[tokio::test]
    async fn unknown_skill_is_rejected_with_audit_entry() {
        let h = harness();

        let result = h
            .engine
            .execute(make_request("missing", Tier::Free, serde_json::json!({})))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
        assert_eq!(result.audit_ids.len(), 1);
        assert_eq!(h.audit.for_skill("missing").len(), 1);
    }

    #[tokio::test]
    async fn invalid_context_is_rejected() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;

        let request = ExecutionRequest::new(
            "audio-processor",
            "user-1",
            Role::User,
            Tier::Free,
            ExecutionContext::Scheduled,
            serde_json::json!({}),
        );
        let result = h.engine.execute(request).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("execution context"));
        assert_eq!(h.health.get("audio-processor").unwrap().total_executions, 0);
    }

    #[tokio::test]
    async fn grant_override_writes_security_audit() {
        let h = harness();
        let mut skill = make_skill("audio-processor", 5_000);
        skill.permission_flags = PermissionFlags {
            admin: true,
            ..Default::default()
        };
        seed(&h, skill).await;

        h.policy
            .grant(skillgate_types::permission::PermissionGrant {
                skill_id: "audio-processor".to_string(),
                user_id: "user-1".to_string(),
                user_tier: Tier::Free,
                granted_permissions: BTreeSet::from(["execute".to_string()]),
                granted_by: "admin-1".to_string(),
                granted_at: Utc::now(),
                expires_at: None,
            })
            .await;

        let request = ExecutionRequest::new(
            "audio-processor",
            "user-1",
            Role::Admin,
            Tier::Free,
            ExecutionContext::Api,
            serde_json::json!({}),
        );
        let result = h.engine.execute(request).await;

        assert!(result.success);
        let security: Vec<_> = h
            .audit
            .for_skill("audio-processor")
            .into_iter()
            .filter(|e| e.level == AuditEventLevel::Security)
            .collect();
        assert_eq!(security.len(), 1);
        assert_eq!(security[0].action, "permission_override_used");
    }

    #[tokio::test]
    async fn events_are_emitted_for_both_outcomes() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;
        let mut rx = h.bus.subscribe();

        h.engine
            .execute(make_request("audio-processor", Tier::Free, serde_json::json!({})))
            .await;
        h.engine
            .execute(make_request(
                "audio-processor",
                Tier::Free,
                serde_json::json!({"fail": true}),
            ))
            .await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, SkillEvent::SkillExecuted { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, SkillEvent::SkillExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn history_is_bounded_and_filterable() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;

        for _ in 0..10 {
            h.engine
                .execute(make_request("audio-processor", Tier::Free, serde_json::json!({})))
                .await;
        }

        // Ring capacity in the harness is 8.
        let history = h.engine.history("audio-processor", None);
        assert_eq!(history.len(), 8);

        assert_eq!(h.engine.history("audio-processor", Some("user-1")).len(), 8);
        assert!(h.engine.history("audio-processor", Some("nobody")).is_empty());
    }

    #[tokio::test]
    async fn history_cap_one_keeps_only_latest() {
        let h = harness_with_history_cap(1);
        seed(&h, make_skill("audio-processor", 5_000)).await;

        for _ in 0..3 {
            h.engine
                .execute(make_request("audio-processor", Tier::Free, serde_json::json!({})))
                .await;
        }

        assert_eq!(h.engine.history("audio-processor", None).len(), 1);
    }

    #[tokio::test]
    async fn history_cap_zero_records_nothing() {
        let h = harness_with_history_cap(0);
        seed(&h, make_skill("audio-processor", 5_000)).await;

        for _ in 0..3 {
            h.engine
                .execute(make_request("audio-processor", Tier::Free, serde_json::json!({})))
                .await;
        }

        assert!(h.engine.history("audio-processor", None).is_empty());
    }

    #[tokio::test]
    async fn concurrent_executions_of_same_skill_keep_counters_consistent() {
        let h = harness();
        seed(&h, make_skill("audio-processor", 5_000)).await;
        let engine = Arc::new(h.engine);

        let mut handles = Vec::new();
        for n in 0..20 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let fail = n % 2 == 0;
                engine
                    .execute(make_request(
                        "audio-processor",
                        Tier::Free,
                        serde_json::json!({"fail": fail}),
                    ))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let health = h.health.get("audio-processor").unwrap();
        assert_eq!(health.total_executions, 20);
        assert_eq!(h.resources.get("audio-processor").unwrap().samples, 20);
    }
}
