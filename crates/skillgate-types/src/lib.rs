//! Shared domain types for Skillgate.
//!
//! This crate holds the data model for the governed skill execution
//! orchestrator: skill metadata, permission grants, execution requests and
//! results, health status, audit entries, resource usage, domain events,
//! errors, and configuration. It has no IO dependencies so that both the
//! core logic and the infrastructure layer can depend on it.

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod health;
pub mod permission;
pub mod resource;
pub mod skill;
