//! Specialist Delegation
//!
//! `consult` is an ordinary [`Tool`] that opens a child reasoning loop for a
//! named specialist. The child runs one level deeper, over a registry that has
//! no `consult` tool, so delegation cannot recurse. Depth travels in the
//! [`ToolContext`] and is checked before anything else happens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::Roster;
use crate::config::EngineConfig;
use crate::error::ToolError;
use crate::gateway::ModelGateway;
use crate::message::Message;
use crate::prompt;
use crate::reasoning::ReasoningLoop;
use crate::state::ExecutionState;
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolContext, ToolRegistry, ToolSchema};

/// Name under which delegation is registered
pub const CONSULT_TOOL: &str = "consult";

/// Delegation tool bound to one request's specialists
pub struct ConsultTool {
    specialists: Roster,
    base_tools: Arc<ToolRegistry>,
    gateway: Arc<dyn ModelGateway>,
    config: Arc<EngineConfig>,
}

impl ConsultTool {
    /// `base_tools` is what a specialist may use; it must not contain `consult`
    pub fn new(
        specialists: Roster,
        base_tools: Arc<ToolRegistry>,
        gateway: Arc<dyn ModelGateway>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            specialists,
            base_tools,
            gateway,
            config,
        }
    }
}

#[async_trait]
impl Tool for ConsultTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: CONSULT_TOOL.into(),
            description: "Consult a specialist agent for expert advice on a specific topic. Provide the exact name of the specialist and the specific question you want to ask.".into(),
            parameters: vec![
                ParameterSchema::string("specialist_name", "Exact name of the specialist to consult", true),
                ParameterSchema::string("question", "The question for the specialist", true),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let name = call.require_str("specialist_name")?;
        let question = call.require_str("question")?;

        let requested = ctx.depth + 1;
        if requested > self.config.max_delegation_depth {
            tracing::warn!(
                agent = %ctx.agent_id,
                specialist = %name,
                depth = ctx.depth,
                max = self.config.max_delegation_depth,
                "Delegation refused"
            );
            return Err(ToolError::DelegationDepthExceeded {
                requested,
                max: self.config.max_delegation_depth,
            });
        }

        let Some((_, specialist)) = self.specialists.resolve(name) else {
            tracing::warn!(agent = %ctx.agent_id, specialist = %name, "Specialist not found");
            return Err(ToolError::SpecialistNotFound(name.to_string()));
        };

        tracing::info!(
            agent = %ctx.agent_id,
            specialist = %specialist.name,
            depth = requested,
            "Consulting specialist"
        );

        let child = specialist.clone().without_tool(CONSULT_TOOL);
        let reasoning = ReasoningLoop::new(
            self.gateway.clone(),
            self.base_tools.clone(),
            child,
            self.config.clone(),
        )
        .with_system_prompt(prompt::specialist_prompt(specialist));

        let mut state = ExecutionState::new(requested);
        state.push(Message::user(question));

        match reasoning.run(&mut state).await {
            Ok(answer) => Ok(format!("Response from {}:\n{answer}", specialist.name)),
            Err(err) => Err(ToolError::DelegationFailed {
                specialist: specialist.name.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.config.delegation_timeout())
    }
}
