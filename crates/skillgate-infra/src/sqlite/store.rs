//! SQLite-backed implementation of the [`SkillStore`] port.
//!
//! Skills, grants, and audit entries are stored as one row each. Closed
//! enums are stored as their canonical text form and parsed back through
//! `FromStr`, so an unknown value in the database surfaces as a
//! serialization error instead of silently mapping to a default. Structured
//! fields (contexts, limits, flags, permission sets) are stored as JSON.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use skillgate_core::store::SkillStore;
use skillgate_types::audit::{AuditEntry, AuditEventLevel};
use skillgate_types::error::StoreError;
use skillgate_types::permission::PermissionGrant;
use skillgate_types::skill::{
    AuditLevel, ExecutionContext, PermissionFlags, ResourceLimits, Skill, SkillCategory, Tier,
};

use super::pool::DatabasePool;

/// Durable [`SkillStore`] over the split reader/writer pool.
pub struct SqliteStore {
    pool: DatabasePool,
}

impl SqliteStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn parse_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(err.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(parse_err)?
        .with_timezone(&Utc))
}

impl SkillStore for SqliteStore {
    async fn upsert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        let contexts: Vec<String> = skill
            .execution_contexts
            .iter()
            .map(|c| c.to_string())
            .collect();

        sqlx::query(
            r#"INSERT INTO skills
               (id, name, version, category, execution_contexts,
                resource_limits, permission_flags, audit_level, last_updated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 version = excluded.version,
                 category = excluded.category,
                 execution_contexts = excluded.execution_contexts,
                 resource_limits = excluded.resource_limits,
                 permission_flags = excluded.permission_flags,
                 audit_level = excluded.audit_level,
                 last_updated = excluded.last_updated"#,
        )
        .bind(&skill.id)
        .bind(&skill.name)
        .bind(skill.version.to_string())
        .bind(skill.category.to_string())
        .bind(serde_json::to_string(&contexts)?)
        .bind(serde_json::to_string(&skill.resource_limits)?)
        .bind(serde_json::to_string(&skill.permission_flags)?)
        .bind(skill.audit_level.to_string())
        .bind(skill.last_updated.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn remove_skill(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM skills WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_skills(&self) -> Result<Vec<Skill>, StoreError> {
        let rows = sqlx::query("SELECT * FROM skills ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_err)?;

        let mut skills = Vec::with_capacity(rows.len());
        for row in &rows {
            skills.push(skill_from_row(row)?);
        }
        Ok(skills)
    }

    async fn upsert_grant(&self, grant: &PermissionGrant) -> Result<(), StoreError> {
        let permissions: Vec<&String> = grant.granted_permissions.iter().collect();

        sqlx::query(
            r#"INSERT INTO permission_grants
               (skill_id, user_id, user_tier, granted_permissions,
                granted_by, granted_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(skill_id, user_id) DO UPDATE SET
                 user_tier = excluded.user_tier,
                 granted_permissions = excluded.granted_permissions,
                 granted_by = excluded.granted_by,
                 granted_at = excluded.granted_at,
                 expires_at = excluded.expires_at"#,
        )
        .bind(&grant.skill_id)
        .bind(&grant.user_id)
        .bind(grant.user_tier.to_string())
        .bind(serde_json::to_string(&permissions)?)
        .bind(&grant.granted_by)
        .bind(grant.granted_at.to_rfc3339())
        .bind(grant.expires_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn remove_grant(&self, skill_id: &str, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM permission_grants WHERE skill_id = ? AND user_id = ?")
            .bind(skill_id)
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_grants(&self) -> Result<Vec<PermissionGrant>, StoreError> {
        let rows = sqlx::query("SELECT * FROM permission_grants ORDER BY skill_id, user_id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_err)?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in &rows {
            grants.push(grant_from_row(row)?);
        }
        Ok(grants)
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let level = match entry.level {
            AuditEventLevel::Info => "info",
            AuditEventLevel::Warning => "warning",
            AuditEventLevel::Critical => "critical",
            AuditEventLevel::Security => "security",
        };

        sqlx::query(
            r#"INSERT INTO audit_log
               (id, timestamp, level, action, user_id, skill_id, details, input_hash)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.timestamp.to_rfc3339())
        .bind(level)
        .bind(&entry.action)
        .bind(&entry.user_id)
        .bind(&entry.skill_id)
        .bind(&entry.details)
        .bind(&entry.input_hash)
        .execute(&self.pool.writer)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn load_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        // v7 ids sort in insertion order, so the tail query and the reorder
        // both key on id.
        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM audit_log ORDER BY id DESC LIMIT ?) ORDER BY id ASC",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(db_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(audit_from_row(row)?);
        }
        Ok(entries)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn skill_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Skill, StoreError> {
    let version: String = row.try_get("version").map_err(db_err)?;
    let category: String = row.try_get("category").map_err(db_err)?;
    let contexts_json: String = row.try_get("execution_contexts").map_err(db_err)?;
    let limits_json: String = row.try_get("resource_limits").map_err(db_err)?;
    let flags_json: String = row.try_get("permission_flags").map_err(db_err)?;
    let audit_level: String = row.try_get("audit_level").map_err(db_err)?;
    let last_updated: String = row.try_get("last_updated").map_err(db_err)?;

    let context_names: Vec<String> = serde_json::from_str(&contexts_json)?;
    let execution_contexts = context_names
        .iter()
        .map(|name| name.parse::<ExecutionContext>().map_err(parse_err))
        .collect::<Result<_, _>>()?;

    Ok(Skill {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        version: version.parse::<semver::Version>().map_err(parse_err)?,
        category: category.parse::<SkillCategory>().map_err(parse_err)?,
        execution_contexts,
        resource_limits: serde_json::from_str::<ResourceLimits>(&limits_json)?,
        permission_flags: serde_json::from_str::<PermissionFlags>(&flags_json)?,
        audit_level: audit_level.parse::<AuditLevel>().map_err(parse_err)?,
        last_updated: parse_timestamp(&last_updated)?,
    })
}

fn grant_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PermissionGrant, StoreError> {
    let tier: String = row.try_get("user_tier").map_err(db_err)?;
    let permissions_json: String = row.try_get("granted_permissions").map_err(db_err)?;
    let granted_at: String = row.try_get("granted_at").map_err(db_err)?;
    let expires_at: Option<String> = row.try_get("expires_at").map_err(db_err)?;

    Ok(PermissionGrant {
        skill_id: row.try_get("skill_id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        user_tier: tier.parse::<Tier>().map_err(parse_err)?,
        granted_permissions: serde_json::from_str(&permissions_json)?,
        granted_by: row.try_get("granted_by").map_err(db_err)?,
        granted_at: parse_timestamp(&granted_at)?,
        expires_at: expires_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn audit_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry, StoreError> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let timestamp: String = row.try_get("timestamp").map_err(db_err)?;
    let level: String = row.try_get("level").map_err(db_err)?;

    let level = match level.as_str() {
        "info" => AuditEventLevel::Info,
        "warning" => AuditEventLevel::Warning,
        "critical" => AuditEventLevel::Critical,
        "security" => AuditEventLevel::Security,
        other => return Err(StoreError::Serialization(format!("unknown audit level: '{other}'"))),
    };

    Ok(AuditEntry {
        id: Uuid::parse_str(&id).map_err(parse_err)?,
        timestamp: parse_timestamp(&timestamp)?,
        level,
        action: row.try_get("action").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        skill_id: row.try_get("skill_id").map_err(db_err)?,
        details: row.try_get("details").map_err(db_err)?,
        input_hash: row.try_get("input_hash").map_err(db_err)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    async fn test_store() -> SqliteStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn make_skill(id: &str) -> Skill {
        Skill {
            id: id.to_string(),
            name: format!("Skill {id}"),
            version: semver::Version::new(1, 2, 3),
            category: SkillCategory::Audio,
            execution_contexts: BTreeSet::from([ExecutionContext::Api, ExecutionContext::Dashboard]),
            resource_limits: ResourceLimits {
                memory_mb: 128,
                cpu_percent: 75,
                timeout_ms: 10_000,
            },
            permission_flags: PermissionFlags {
                admin: true,
                ..Default::default()
            },
            audit_level: AuditLevel::Verbose,
            last_updated: Utc::now(),
        }
    }

    fn make_grant(skill_id: &str, user_id: &str) -> PermissionGrant {
        PermissionGrant {
            skill_id: skill_id.to_string(),
            user_id: user_id.to_string(),
            user_tier: Tier::Free,
            granted_permissions: BTreeSet::from(["execute".to_string(), "inspect".to_string()]),
            granted_by: "admin-1".to_string(),
            granted_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn skill_round_trip() {
        let store = test_store().await;
        let skill = make_skill("audio-processor");

        store.upsert_skill(&skill).await.unwrap();
        let loaded = store.load_skills().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "audio-processor");
        assert_eq!(loaded[0].version, semver::Version::new(1, 2, 3));
        assert_eq!(loaded[0].category, SkillCategory::Audio);
        assert_eq!(loaded[0].execution_contexts.len(), 2);
        assert_eq!(loaded[0].resource_limits.memory_mb, 128);
        assert!(loaded[0].permission_flags.admin);
        assert_eq!(loaded[0].audit_level, AuditLevel::Verbose);
    }

    #[tokio::test]
    async fn skill_upsert_replaces() {
        let store = test_store().await;
        let mut skill = make_skill("audio-processor");
        store.upsert_skill(&skill).await.unwrap();

        skill.name = "Renamed".to_string();
        skill.version = semver::Version::new(2, 0, 0);
        store.upsert_skill(&skill).await.unwrap();

        let loaded = store.load_skills().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Renamed");
        assert_eq!(loaded[0].version, semver::Version::new(2, 0, 0));

        store.remove_skill("audio-processor").await.unwrap();
        assert!(store.load_skills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn grant_round_trip_and_replace() {
        let store = test_store().await;
        let mut grant = make_grant("audio-processor", "user-1");
        store.upsert_grant(&grant).await.unwrap();

        grant.granted_permissions = BTreeSet::from(["execute".to_string()]);
        grant.expires_at = Some(Utc::now() + chrono::Duration::hours(1));
        store.upsert_grant(&grant).await.unwrap();

        let loaded = store.load_grants().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].granted_permissions.len(), 1);
        assert!(loaded[0].expires_at.is_some());

        store.remove_grant("audio-processor", "user-1").await.unwrap();
        assert!(store.load_grants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_tail_is_oldest_first() {
        let store = test_store().await;
        for n in 0..5 {
            let entry = AuditEntry::new(
                AuditEventLevel::Info,
                "skill_executed",
                Some("user-1".to_string()),
                Some("audio-processor".to_string()),
                format!("entry {n}"),
            );
            store.append_audit(&entry).await.unwrap();
        }

        let tail = store.load_audit(3).await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].details, "entry 2");
        assert_eq!(tail[2].details, "entry 4");
    }

    #[tokio::test]
    async fn audit_preserves_level_and_hash() {
        let store = test_store().await;
        let entry = AuditEntry::new(
            AuditEventLevel::Security,
            "permission_override_used",
            Some("user-1".to_string()),
            Some("audio-processor".to_string()),
            "grant override",
        )
        .with_input_hash("abc123");
        store.append_audit(&entry).await.unwrap();

        let loaded = store.load_audit(10).await.unwrap();
        assert_eq!(loaded[0].level, AuditEventLevel::Security);
        assert_eq!(loaded[0].input_hash.as_deref(), Some("abc123"));
        assert_eq!(loaded[0].id, entry.id);
    }
}
