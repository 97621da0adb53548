//! Cryptographic adapters.

pub mod hash;

pub use hash::Sha256ContentHasher;
