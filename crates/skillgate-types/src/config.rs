//! Orchestrator configuration.
//!
//! Deserialized from `config.toml` in the data directory; every field has a
//! default so a missing or partial file still yields a working config.

use serde::{Deserialize, Serialize};

/// Tunable limits for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard cap on the in-memory audit log.
    #[serde(default = "default_audit_cap")]
    pub audit_cap: usize,
    /// Number of most-recent entries retained after a cap truncation.
    #[serde(default = "default_audit_retain")]
    pub audit_retain: usize,
    /// Per-skill execution history ring size.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Event bus channel capacity.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Override for the SQLite database URL. When absent, the data-dir
    /// default applies.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_audit_cap() -> usize {
    10_000
}

fn default_audit_retain() -> usize {
    5_000
}

fn default_history_cap() -> usize {
    256
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            audit_cap: default_audit_cap(),
            audit_retain: default_audit_retain(),
            history_cap: default_history_cap(),
            event_capacity: default_event_capacity(),
            database_url: None,
        }
    }
}
