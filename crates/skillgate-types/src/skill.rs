//! Skill catalog domain types.
//!
//! Defines the [`Skill`] record owned by the registry, the closed enums for
//! category, tier, role, execution context, and audit level, and the
//! [`SkillPatch`] merge type used by partial updates. All enums are closed
//! sets: unknown values are rejected at every serialization boundary.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// The functional category of a skill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Audio,
    Video,
    Image,
    Text,
    Data,
    Integration,
    System,
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
            Self::Text => "text",
            Self::Data => "data",
            Self::Integration => "integration",
            Self::System => "system",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SkillCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            "data" => Ok(Self::Data),
            "integration" => Ok(Self::Integration),
            "system" => Ok(Self::System),
            other => Err(UnknownVariant::new("category", other)),
        }
    }
}

/// Subscription tier governing default skill visibility and access.
///
/// Tiers form a ladder: `Enterprise ⊇ Pro ⊇ Free`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Tier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(UnknownVariant::new("tier", other)),
        }
    }
}

/// The acting principal's authority level, supplied by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    User,
    Guest,
}

impl Role {
    /// Position in the authority ladder (`Owner > Admin > User > Guest`).
    pub fn rank(self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Admin => 2,
            Self::User => 1,
            Self::Guest => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// The calling environment a skill is permitted to run in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    AdminTool,
    Dashboard,
    DemoIntegration,
    Api,
    Scheduled,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AdminTool => "admin_tool",
            Self::Dashboard => "dashboard",
            Self::DemoIntegration => "demo_integration",
            Self::Api => "api",
            Self::Scheduled => "scheduled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ExecutionContext {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin_tool" => Ok(Self::AdminTool),
            "dashboard" => Ok(Self::Dashboard),
            "demo_integration" => Ok(Self::DemoIntegration),
            "api" => Ok(Self::Api),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(UnknownVariant::new("execution context", other)),
        }
    }
}

/// A skill's declared verbosity/retention class for its audit entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Minimal,
    Standard,
    Verbose,
}

impl AuditLevel {
    /// Retention period exposed to external retention jobs, in days.
    pub fn retention_days(self) -> u32 {
        match self {
            Self::Minimal => 30,
            Self::Standard => 365,
            Self::Verbose => 2555, // 7 years
        }
    }

    /// The audit log types recorded at this level.
    pub fn log_types(self) -> &'static [AuditLogType] {
        use AuditLogType::*;
        match self {
            Self::Minimal => &[Execution, Error],
            Self::Standard => &[Execution, Error, Permission, Resource],
            Self::Verbose => &[Execution, Error, Permission, Resource, System, Security],
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Verbose => "verbose",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AuditLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(Self::Minimal),
            "standard" => Ok(Self::Standard),
            "verbose" => Ok(Self::Verbose),
            other => Err(UnknownVariant::new("audit level", other)),
        }
    }
}

/// Classification of audit log entries, used by the retention mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditLogType {
    Execution,
    Error,
    Permission,
    Resource,
    System,
    Security,
}

/// Error for a string that does not name a known enum variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Skill record
// ---------------------------------------------------------------------------

/// Which roles a skill is exposed to, by flag.
///
/// The flags also drive tier visibility: `Free` sees skills with `user`,
/// `Pro` sees `admin || user`, `Enterprise` sees `owner || admin || user`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionFlags {
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub user: bool,
}

/// Resource limits enforced per execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum memory in megabytes.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    /// Maximum CPU share as a percentage.
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: u8,
    /// Hard wall-clock bound for a single execution in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_memory_mb() -> u64 {
    64
}

fn default_cpu_percent() -> u8 {
    50
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_percent: default_cpu_percent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// A named, versioned capability that can be invoked through the orchestrator.
///
/// Owned exclusively by the registry: created by registration, mutated by
/// update, removed by unregistration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Skill {
    /// Globally unique identifier (slug format, e.g. "audio-processor").
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    pub version: semver::Version,
    pub category: SkillCategory,
    /// Calling environments this skill may run in. At least one is required.
    pub execution_contexts: BTreeSet<ExecutionContext>,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
    #[serde(default)]
    pub permission_flags: PermissionFlags,
    pub audit_level: AuditLevel,
    pub last_updated: DateTime<Utc>,
}

impl Skill {
    /// Whether this skill is visible to (and executable by) the given tier,
    /// per the tier ladder on [`PermissionFlags`].
    pub fn allows_tier(&self, tier: Tier) -> bool {
        let f = self.permission_flags;
        match tier {
            Tier::Free => f.user,
            Tier::Pro => f.admin || f.user,
            Tier::Enterprise => f.owner || f.admin || f.user,
        }
    }

    /// The least-privileged role this skill is exposed to, if any.
    pub fn minimum_role(&self) -> Option<Role> {
        let f = self.permission_flags;
        if f.user {
            Some(Role::User)
        } else if f.admin {
            Some(Role::Admin)
        } else if f.owner {
            Some(Role::Owner)
        } else {
            None
        }
    }

    /// Whether the given role clears this skill's role requirement.
    ///
    /// Guests are never allowed; otherwise the role ladder applies against
    /// [`Skill::minimum_role`].
    pub fn allows_role(&self, role: Role) -> bool {
        if role == Role::Guest {
            return false;
        }
        match self.minimum_role() {
            Some(min) => role.rank() >= min.rank(),
            None => false,
        }
    }

    /// Whether the given calling environment is declared for this skill.
    pub fn allows_context(&self, context: ExecutionContext) -> bool {
        self.execution_contexts.contains(&context)
    }
}

// ---------------------------------------------------------------------------
// Partial update
// ---------------------------------------------------------------------------

/// A merge patch for [`Skill`]: every field is optional, present fields
/// replace the current value. The skill id itself is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<semver::Version>,
    #[serde(default)]
    pub category: Option<SkillCategory>,
    #[serde(default)]
    pub execution_contexts: Option<BTreeSet<ExecutionContext>>,
    #[serde(default)]
    pub resource_limits: Option<ResourceLimits>,
    #[serde(default)]
    pub permission_flags: Option<PermissionFlags>,
    #[serde(default)]
    pub audit_level: Option<AuditLevel>,
}

impl SkillPatch {
    /// Apply this patch to a skill, stamping `last_updated`.
    pub fn apply(&self, skill: &mut Skill) {
        if let Some(name) = &self.name {
            skill.name = name.clone();
        }
        if let Some(version) = &self.version {
            skill.version = version.clone();
        }
        if let Some(category) = self.category {
            skill.category = category;
        }
        if let Some(contexts) = &self.execution_contexts {
            skill.execution_contexts = contexts.clone();
        }
        if let Some(limits) = self.resource_limits {
            skill.resource_limits = limits;
        }
        if let Some(flags) = self.permission_flags {
            skill.permission_flags = flags;
        }
        if let Some(level) = self.audit_level {
            skill.audit_level = level;
        }
        skill.last_updated = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
