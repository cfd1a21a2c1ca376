//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for one agent:
//!
//! ```text
//! THINKING ─▶ (ACTING ─▶ OBSERVING ─▶ THINKING)* ─▶ ANSWERING ─▶ DONE
//!     └────────────── ModelUnavailable ──────────────▶ FAILED
//! ```
//!
//! Tool failures are observations the model can react to. Model failures end
//! the loop; the partial trace stays in the caller's [`ExecutionState`].

use std::sync::Arc;

use crate::agent::AgentConfig;
use crate::config::EngineConfig;
use crate::error::{AgentError, Result};
use crate::gateway::{complete_within, GenerationOptions, ModelGateway};
use crate::message::Message;
use crate::prompt;
use crate::state::{ExecutionState, ExecutionStatus};
use crate::tool::{ToolCall, ToolContext, ToolRegistry, ToolSchema};

/// Fallback answer when a forced final reply carries no text
const EMPTY_FORCED_ANSWER: &str =
    "I could not complete the analysis within the allowed number of steps.";

enum Phase {
    Thinking,
    Acting(ToolCall),
    Observing { tool: String, observation: String },
    Answering(Message),
    Failed(AgentError),
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Thinking => "thinking",
            Phase::Acting(_) => "acting",
            Phase::Observing { .. } => "observing",
            Phase::Answering(_) => "answering",
            Phase::Failed(_) => "failed",
        }
    }
}

/// Drives one agent until it answers or the model becomes unavailable
#[derive(Clone)]
pub struct ReasoningLoop {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    agent: AgentConfig,
    system_prompt: String,
    config: Arc<EngineConfig>,
}

impl ReasoningLoop {
    /// Loop for `agent`, prompted with its persona
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        agent: AgentConfig,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            system_prompt: prompt::agent_prompt(&agent),
            gateway,
            tools,
            agent,
            config,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run until DONE or FAILED, appending every step to `state`
    pub async fn run(&self, state: &mut ExecutionState) -> Result<String> {
        state.set_status(ExecutionStatus::Running);

        let scope = self.tools.scope(&self.agent.allowed_tools);
        let offered = scope.schemas();
        let options = GenerationOptions::for_model(&self.agent.model_id);
        let ctx = ToolContext::new(&self.agent.id, state.depth());

        tracing::info!(
            agent = %self.agent.name,
            depth = state.depth(),
            tools = offered.len(),
            "Reasoning loop started"
        );

        let mut phase = Phase::Thinking;
        loop {
            tracing::debug!(
                agent = %self.agent.name,
                depth = state.depth(),
                iteration = state.iteration_count(),
                phase = phase.label(),
                "Reasoning step"
            );

            phase = match phase {
                Phase::Thinking => match self.think(state, &offered, &options).await {
                    Ok(reply) => match reply.tool_call.clone() {
                        Some(call) => {
                            state.push(reply.with_name(&self.agent.name));
                            Phase::Acting(call)
                        }
                        None => Phase::Answering(reply),
                    },
                    Err(err) => Phase::Failed(err),
                },

                Phase::Acting(call) => {
                    let observation = match scope.invoke(&call, &ctx).await {
                        Ok(output) if output.trim().is_empty() => {
                            format!("Tool '{}' completed with no output.", call.name)
                        }
                        Ok(output) => output,
                        Err(err) => {
                            tracing::warn!(agent = %self.agent.name, tool = %call.name, error = %err, "Tool call failed");
                            err.observation()
                        }
                    };
                    Phase::Observing {
                        tool: call.name,
                        observation,
                    }
                }

                Phase::Observing { tool, observation } => {
                    state.push(Message::tool(tool, observation));
                    let iteration = state.record_iteration();

                    if iteration >= self.config.max_iterations {
                        tracing::warn!(
                            agent = %self.agent.name,
                            iteration,
                            "Iteration ceiling reached, forcing an answer"
                        );
                        state.push(Message::system(prompt::truncation_notice(
                            self.config.max_iterations,
                        )));
                        match self.think(state, &[], &options).await {
                            Ok(reply) => Phase::Answering(Self::strip_tool_call(reply)),
                            Err(err) => Phase::Failed(err),
                        }
                    } else {
                        Phase::Thinking
                    }
                }

                Phase::Answering(reply) => {
                    let answer = reply.content.clone();
                    state.push(reply.with_name(&self.agent.name));
                    state.set_status(ExecutionStatus::Done);
                    tracing::info!(
                        agent = %self.agent.name,
                        depth = state.depth(),
                        iterations = state.iteration_count(),
                        "Reasoning loop finished"
                    );
                    return Ok(answer);
                }

                Phase::Failed(err) => {
                    tracing::error!(agent = %self.agent.name, depth = state.depth(), error = %err, "Reasoning loop failed");
                    state.set_status(ExecutionStatus::Error);
                    return Err(err);
                }
            };
        }
    }

    async fn think(
        &self,
        state: &ExecutionState,
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Message> {
        complete_within(
            self.gateway.as_ref(),
            self.config.model_timeout(),
            &self.system_prompt,
            state.messages(),
            tools,
            options,
        )
        .await
    }

    /// A forced answer must not act; keep its text only
    fn strip_tool_call(mut reply: Message) -> Message {
        if let Some(call) = reply.tool_call.take() {
            tracing::debug!(tool = %call.name, "Tool call discarded from forced answer");
        }
        if reply.content.trim().is_empty() {
            reply.content = EMPTY_FORCED_ANSWER.into();
        }
        reply
    }
}
