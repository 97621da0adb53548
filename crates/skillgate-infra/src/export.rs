//! JSON snapshot export.
//!
//! Writes the orchestrator's three collections to `skills.json`,
//! `permissions.json`, and `audit.json` in a target directory, each as a
//! pretty-printed JSON array. Interchange format for external tooling; the
//! SQLite store remains the durable source.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use skillgate_types::audit::AuditEntry;
use skillgate_types::permission::PermissionGrant;
use skillgate_types::skill::Skill;

pub const SKILLS_FILE: &str = "skills.json";
pub const PERMISSIONS_FILE: &str = "permissions.json";
pub const AUDIT_FILE: &str = "audit.json";

/// Export skills, grants, and audit entries as JSON documents under `dir`.
///
/// The directory is created if missing. Each file is replaced atomically
/// enough for tooling: written to a `.tmp` sibling and renamed into place.
pub async fn export_snapshot(
    dir: &Path,
    skills: &[Skill],
    grants: &[PermissionGrant],
    audit: &[AuditEntry],
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating export directory {}", dir.display()))?;

    write_json(dir, SKILLS_FILE, skills).await?;
    write_json(dir, PERMISSIONS_FILE, grants).await?;
    write_json(dir, AUDIT_FILE, audit).await?;

    tracing::info!(
        dir = %dir.display(),
        skills = skills.len(),
        grants = grants.len(),
        audit = audit.len(),
        "snapshot exported"
    );
    Ok(())
}

async fn write_json<T: Serialize>(dir: &Path, name: &str, value: &[T]) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let path = dir.join(name);
    let tmp = dir.join(format!("{name}.tmp"));

    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .with_context(|| format!("renaming {} into place", path.display()))?;
    Ok(())
}
