//! Engine Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Limits and deadlines applied to every execution
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tool-call/observe cycles per reasoning loop before a forced answer
    pub max_iterations: u32,

    /// Deepest allowed specialist nesting (top-level loop is depth 0)
    pub max_delegation_depth: u32,

    /// Supervisor decisions per execution before it is made to finish
    pub max_route_turns: u32,

    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub delegation_timeout_secs: u64,

    /// Model for engine-owned calls (supervisor, planner, synthesizer)
    pub default_model: String,

    /// Pending envelopes per agent mailbox
    pub mailbox_capacity: usize,

    /// Offer the supervisor a `route` tool with an enumerated choice
    pub structured_routing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_delegation_depth: 1,
            max_route_turns: 8,
            model_timeout_secs: 120,
            tool_timeout_secs: 60,
            delegation_timeout_secs: 300,
            default_model: "qwen3:latest".into(),
            mailbox_capacity: 32,
            structured_routing: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `AGENT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse("AGENT_MAX_ITERATIONS")? {
            config.max_iterations = v;
        }
        if let Some(v) = env_parse("AGENT_MAX_DELEGATION_DEPTH")? {
            config.max_delegation_depth = v;
        }
        if let Some(v) = env_parse("AGENT_MAX_ROUTE_TURNS")? {
            config.max_route_turns = v;
        }
        if let Some(v) = env_parse("AGENT_MODEL_TIMEOUT_SECS")? {
            config.model_timeout_secs = v;
        }
        if let Some(v) = env_parse("AGENT_TOOL_TIMEOUT_SECS")? {
            config.tool_timeout_secs = v;
        }
        if let Some(v) = env_parse("AGENT_DELEGATION_TIMEOUT_SECS")? {
            config.delegation_timeout_secs = v;
        }
        if let Some(v) = env_parse("AGENT_STRUCTURED_ROUTING")? {
            config.structured_routing = v;
        }
        if let Ok(model) = std::env::var("AGENT_DEFAULT_MODEL") {
            config.default_model = model;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(AgentError::Config("mailbox_capacity must be at least 1".into()));
        }
        if self.model_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(AgentError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn delegation_timeout(&self) -> Duration {
        Duration::from_secs(self.delegation_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
