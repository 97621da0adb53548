//! Observability setup for Skillgate.

pub mod tracing_setup;
