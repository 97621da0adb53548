//! Execution sandbox trait.
//!
//! The orchestrator never runs skill bodies itself: dispatch goes through
//! the [`ExecutionSandbox`] seam, implemented by an external execution
//! collaborator (process isolation, WASM, container). An in-process
//! implementation for demos and tests lives in `skillgate-infra`. Uses
//! RPITIT for async methods.

use std::future::Future;

use skillgate_types::execution::ExecutionRequest;
use skillgate_types::skill::Skill;

/// What the sandbox observed while running a skill body.
///
/// Resource figures are optional: a sandbox that cannot measure them
/// returns `None` and the execution engine synthesizes figures from the
/// skill's declared limits.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    /// The skill's output value.
    pub output: serde_json::Value,
    /// Peak memory in megabytes, if measured.
    pub memory_mb: Option<f64>,
    /// CPU share as a percentage, if measured.
    pub cpu_percent: Option<f64>,
    /// Network bytes transferred, if measured.
    pub network_bytes: Option<u64>,
}

impl SandboxOutcome {
    /// An outcome carrying only an output value, no measurements.
    pub fn output_only(output: serde_json::Value) -> Self {
        Self {
            output,
            memory_mb: None,
            cpu_percent: None,
            network_bytes: None,
        }
    }
}

/// Trait for dispatching a skill body under resource isolation.
///
/// The engine wraps every `dispatch` call in a deadline taken from the
/// skill's `resource_limits.timeout_ms`; implementations do not need to
/// enforce the wall-clock bound themselves.
pub trait ExecutionSandbox: Send + Sync {
    /// Run the skill body for the given request.
    ///
    /// An `Err` is treated as an execution failure: the skill's health
    /// degrades and a critical audit entry is written.
    fn dispatch(
        &self,
        skill: &Skill,
        request: &ExecutionRequest,
    ) -> impl Future<Output = anyhow::Result<SandboxOutcome>> + Send;
}
