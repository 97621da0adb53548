//! In-process sandbox for host-native skill handlers.
//!
//! Implements [`ExecutionSandbox`] by dispatching to registered Rust
//! closures keyed by skill id. Handlers run with full trust inside the host
//! process; the engine still applies the skill's declared deadline around
//! the dispatch. Handlers may report measured resource figures in the
//! outcome; when they report none, the engine fills in figures derived from
//! the skill's declared limits.

use std::sync::Arc;

use anyhow::bail;
use dashmap::DashMap;

use skillgate_core::sandbox::{ExecutionSandbox, SandboxOutcome};
use skillgate_types::execution::ExecutionRequest;
use skillgate_types::skill::Skill;

/// A registered skill handler: parameters in, output (or failure) out.
pub type SkillHandler =
    dyn Fn(&serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync;

/// Sandbox that runs skill handlers as in-process closures.
#[derive(Default)]
pub struct InProcessSandbox {
    handlers: DashMap<String, Arc<SkillHandler>>,
}

impl InProcessSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a skill id.
    pub fn register<F>(&self, skill_id: impl Into<String>, handler: F)
    where
        F: Fn(&serde_json::Value) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.handlers.insert(skill_id.into(), Arc::new(handler));
    }

    /// Remove the handler for a skill id, e.g. on unregistration.
    pub fn deregister(&self, skill_id: &str) {
        self.handlers.remove(skill_id);
    }

    pub fn has_handler(&self, skill_id: &str) -> bool {
        self.handlers.contains_key(skill_id)
    }
}

impl ExecutionSandbox for InProcessSandbox {
    async fn dispatch(
        &self,
        skill: &Skill,
        request: &ExecutionRequest,
    ) -> anyhow::Result<SandboxOutcome> {
        let handler = match self.handlers.get(&skill.id) {
            Some(handler) => Arc::clone(&handler),
            None => bail!("no handler registered for skill '{}'", skill.id),
        };

        let output = handler(&request.parameters)?;
        Ok(SandboxOutcome::output_only(output))
    }
}
