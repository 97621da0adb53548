//! SHA-256 content hashing for audit parameter privacy.
//!
//! Implements the `ContentHasher` trait from `skillgate-core` using the
//! `sha2` crate (RustCrypto ecosystem). Audit entries store a digest of the
//! request parameters, never the raw payload.

use sha2::{Digest, Sha256};

use skillgate_core::hash::ContentHasher;

/// SHA-256 implementation of `ContentHasher`.
///
/// Computes lowercase hex-encoded SHA-256 digests of content strings.
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        format!("{:x}", digest)
    }
}
