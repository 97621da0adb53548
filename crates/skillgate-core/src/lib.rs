//! Business logic for the Skillgate orchestrator.
//!
//! This crate defines the registry, permission policy engine, execution
//! engine, health monitor, resource tracker, bounded audit log, analytics
//! aggregator, and the event bus, plus the "ports" (the [`store::SkillStore`]
//! persistence trait and the [`sandbox::ExecutionSandbox`] dispatch trait)
//! that the infrastructure layer implements. It depends only on
//! `skillgate-types` -- never on any database/IO crate.

pub mod analytics;
pub mod audit;
pub mod engine;
pub mod event;
pub mod hash;
pub mod health;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod resource;
pub mod sandbox;
pub mod store;

pub use orchestrator::Orchestrator;
