//! Domain error taxonomy.
//!
//! Validation, conflict, permission, and not-found failures are returned
//! synchronously as structured values so calling surfaces can render them
//! directly; they are never panicked across the API boundary. Persistence
//! failures are recovered locally and never roll back in-memory state.

use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed skill metadata at registration. Carries every failed
    /// check, not just the first.
    #[error("invalid skill: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Duplicate skill id on register. Existing state is untouched.
    #[error("skill '{0}' already registered")]
    Conflict(String),

    #[error("skill '{0}' not found")]
    NotFound(String),
}

/// Errors from permission policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("skill '{0}' not found")]
    SkillNotFound(String),

    #[error("no grant for skill '{skill_id}' and user '{user_id}'")]
    GrantNotFound { skill_id: String, user_id: String },
}

/// Errors from the persistence layer.
///
/// These are logged and counted but never surfaced as operation failures:
/// the in-memory state is authoritative (availability over durability).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_all_reasons() {
        let err = RegistryError::Validation(vec![
            "id must not be empty".to_string(),
            "at least one execution context is required".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("id must not be empty"));
        assert!(msg.contains("execution context"));
    }

    #[test]
    fn conflict_error_names_skill() {
        let err = RegistryError::Conflict("audio-processor".to_string());
        assert_eq!(err.to_string(), "skill 'audio-processor' already registered");
    }
}
