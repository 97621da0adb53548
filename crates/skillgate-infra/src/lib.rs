//! Infrastructure adapters for Skillgate.
//!
//! Concrete implementations of the ports defined in `skillgate-core`:
//! SQLite-backed persistence, SHA-256 content hashing, an in-process
//! sandbox, JSON snapshot export, and the config loader.

pub mod config;
pub mod crypto;
pub mod export;
pub mod sandbox;
pub mod sqlite;
