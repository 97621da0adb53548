//! ContentHasher trait for hashing request parameters.
//!
//! Defined in skillgate-core so the execution engine can hash audit inputs
//! without coupling to a specific algorithm. The SHA-256 adapter lives in
//! skillgate-infra.

/// Abstraction over content hashing.
///
/// Used by the execution engine to store a hash of request parameters in
/// audit entries instead of the raw parameters.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}

/// Pass-through hasher for tests and callers that opt out of hashing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHasher;

impl ContentHasher for NoopHasher {
    fn compute_hash(&self, content: &str) -> String {
        format!("len:{}", content.len())
    }
}
