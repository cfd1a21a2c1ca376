//! Supervisor Router
//!
//! A star-shaped graph over a fixed roster: the supervisor picks a worker,
//! the worker acts on the shared history and hands control back. The only
//! way out is the supervisor choosing FINISH, or the turn ceiling.

use std::sync::Arc;

use serde_json::Value;

use crate::agent::Roster;
use crate::config::EngineConfig;
use crate::error::{AgentError, Result};
use crate::gateway::{complete_within, GenerationOptions, ModelGateway};
use crate::message::Message;
use crate::prompt;
use crate::reasoning::ReasoningLoop;
use crate::state::{ExecutionState, ExecutionStatus};
use crate::tool::{ParameterSchema, ToolRegistry, ToolSchema};

/// Terminal routing choice
pub const FINISH: &str = "FINISH";

/// Structured routing tool offered to the supervisor
pub const ROUTE_TOOL: &str = "route";

/// One supervisor turn's choice; workers are referenced by roster index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Worker(usize),
    Finish,
}

/// Fuzzy decision parsing: first roster name contained in the text wins,
/// anything unrecognized finishes
pub fn parse_route(raw: &str, roster: &Roster) -> RouteDecision {
    let cleaned = raw.trim().trim_matches(['"', '\'']).trim().to_lowercase();

    let worker = roster.agents().iter().position(|agent| {
        let name = agent.name.trim().to_lowercase();
        !name.is_empty() && cleaned.contains(&name)
    });
    if let Some(index) = worker {
        return RouteDecision::Worker(index);
    }

    if !cleaned.contains(&FINISH.to_lowercase()) {
        tracing::warn!(output = %raw, "Supervisor output matched no worker, finishing");
    }
    RouteDecision::Finish
}

/// Routes a shared conversation among workers
pub struct Supervisor {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    workers: Roster,
    config: Arc<EngineConfig>,
    knowledge: Option<String>,
}

impl Supervisor {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        workers: Roster,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            gateway,
            tools,
            workers,
            config,
            knowledge: None,
        }
    }

    #[must_use]
    pub fn with_knowledge(mut self, knowledge: Option<String>) -> Self {
        self.knowledge = knowledge;
        self
    }

    fn options(&self) -> Vec<String> {
        std::iter::once(FINISH.to_string())
            .chain(self.workers.names().into_iter().map(String::from))
            .collect()
    }

    fn route_schema(&self) -> ToolSchema {
        ToolSchema {
            name: ROUTE_TOOL.into(),
            description: "Select who acts next, or FINISH when the request is fully answered.".into(),
            parameters: vec![ParameterSchema::string("next", "The next worker or FINISH", true)
                .with_enum(self.options().into_iter().map(Value::String))],
        }
    }

    /// One routing decision over the shared history
    pub async fn decide(&self, history: &[Message]) -> Result<RouteDecision> {
        let options = self.options();
        let mut turn = history.to_vec();
        turn.push(Message::system(prompt::routing_instruction(&options)));

        let tools = if self.config.structured_routing {
            vec![self.route_schema()]
        } else {
            Vec::new()
        };

        let reply = complete_within(
            self.gateway.as_ref(),
            self.config.model_timeout(),
            &prompt::supervisor_prompt(&self.workers, self.knowledge.as_deref()),
            &turn,
            &tools,
            &GenerationOptions::for_model(&self.config.default_model).deterministic(),
        )
        .await?;

        let raw = reply
            .tool_call
            .as_ref()
            .filter(|call| call.name == ROUTE_TOOL)
            .and_then(|call| call.str_arg("next"))
            .unwrap_or(reply.content.as_str());
        tracing::debug!(output = %raw, "Supervisor raw decision");

        let decision = match parse_route(raw, &self.workers) {
            RouteDecision::Finish if history.len() == 1 => {
                tracing::warn!(
                    worker = self.workers.first().map_or("", |w| w.name.as_str()),
                    "Supervisor tried to finish before any worker acted, forcing the first worker"
                );
                RouteDecision::Worker(0)
            }
            decision => decision,
        };
        Ok(decision)
    }

    /// Route until FINISH or the turn ceiling; returns the last worker answer
    pub async fn run(&self, state: &mut ExecutionState) -> Result<String> {
        if self.workers.is_empty() {
            state.set_status(ExecutionStatus::Error);
            return Err(AgentError::InvalidRequest("supervised mode needs at least one worker".into()));
        }
        state.set_status(ExecutionStatus::Running);

        let mut finished = false;
        for turn in 0..self.config.max_route_turns {
            let decision = match self.decide(state.messages()).await {
                Ok(decision) => decision,
                Err(err) => return Self::fail(state, err),
            };
            tracing::info!(turn, ?decision, "Supervisor decision");

            let RouteDecision::Worker(index) = decision else {
                finished = true;
                break;
            };
            let Some(worker) = self.workers.agent(index) else {
                return Self::fail(state, AgentError::AgentNotFound(format!("worker #{index}")));
            };

            let reasoning = ReasoningLoop::new(
                self.gateway.clone(),
                self.tools.clone(),
                worker.clone(),
                self.config.clone(),
            )
            .with_system_prompt(prompt::worker_prompt(worker, self.knowledge.as_deref()));

            let shared = state.len();
            let mut branch = ExecutionState::new(state.depth());
            branch.extend(state.messages().iter().cloned());

            match reasoning.run(&mut branch).await {
                Ok(answer) => {
                    state.push(Message::assistant(answer.clone()).with_name(&worker.name));
                    state.set_output(&worker.id, answer);
                }
                Err(err) => {
                    // Keep the worker's steps up to the failure
                    state.extend(branch.into_messages().into_iter().skip(shared));
                    return Self::fail(state, err);
                }
            }
        }

        if !finished {
            tracing::warn!(turns = self.config.max_route_turns, "Route turn ceiling reached, finishing");
        }

        state.set_status(ExecutionStatus::Done);
        Ok(state.last_answer().unwrap_or_default().to_string())
    }

    fn fail(state: &mut ExecutionState, err: AgentError) -> Result<String> {
        tracing::error!(error = %err, "Supervised execution failed");
        state.set_status(ExecutionStatus::Error);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::message::Role;
    use crate::testing::{Scripted, ScriptedGateway};
    use serde_json::json;

    fn roster() -> Roster {
        Roster::new(vec![AgentConfig::new("a-1", "Legal"), AgentConfig::new("a-2", "Finance")])
    }

    fn supervisor(gateway: &Arc<ScriptedGateway>, config: EngineConfig) -> Supervisor {
        Supervisor::new(gateway.clone(), Arc::new(ToolRegistry::new()), roster(), Arc::new(config))
    }

    #[test]
    fn test_parse_route_fuzzy() {
        let roster = roster();
        assert_eq!(parse_route("  \"finance\" ", &roster), RouteDecision::Worker(1));
        assert_eq!(parse_route("I pick Legal, then Finance", &roster), RouteDecision::Worker(0));
        assert_eq!(parse_route("FINISH.", &roster), RouteDecision::Finish);
        assert_eq!(parse_route("no idea", &roster), RouteDecision::Finish);
    }

    #[test]
    fn test_parse_route_keeps_inner_apostrophes() {
        let roster = Roster::new(vec![AgentConfig::new("a-1", "Legal"), AgentConfig::new("a-2", "O'Neil")]);
        assert_eq!(parse_route("'O'Neil'", &roster), RouteDecision::Worker(1));
        assert_eq!(parse_route("o'neil", &roster), RouteDecision::Worker(1));
    }

    #[test]
    fn test_parse_route_and_resolve_agree_on_unicode_names() {
        let roster = Roster::new(vec![AgentConfig::new("a-1", "Ärztin")]);
        assert_eq!(parse_route("ärztin", &roster), RouteDecision::Worker(0));
        assert_eq!(roster.resolve("ärztin").map(|(i, _)| i), Some(0));
    }

    #[tokio::test]
    async fn test_first_turn_finish_is_overridden() {
        let gateway = Arc::new(ScriptedGateway::new(["FINISH"]));
        let decision = supervisor(&gateway, EngineConfig::default())
            .decide(&[Message::user("compare clauses")])
            .await
            .unwrap();
        assert_eq!(decision, RouteDecision::Worker(0));
    }

    #[tokio::test]
    async fn test_structured_route_choice() {
        let gateway = Arc::new(ScriptedGateway::new([ScriptedGateway::tool_block(
            ROUTE_TOOL,
            json!({"next": "Finance"}),
        )]));
        let decision = supervisor(&gateway, EngineConfig::default())
            .decide(&[Message::user("q"), Message::assistant("a")])
            .await
            .unwrap();
        assert_eq!(decision, RouteDecision::Worker(1));
        assert_eq!(gateway.calls()[0].tools, vec![ROUTE_TOOL]);
    }

    #[tokio::test]
    async fn test_star_routing_until_finish() {
        let gateway = Arc::new(ScriptedGateway::new([
            "FINISH",
            "Clause 4 limits liability.",
            "Finance",
            "Clause 4 costs 10k.",
            "FINISH",
        ]));
        let config = EngineConfig {
            structured_routing: false,
            ..Default::default()
        };
        let mut state = ExecutionState::for_request(vec![], "compare clauses");

        let answer = supervisor(&gateway, config).run(&mut state).await.unwrap();

        assert_eq!(answer, "Clause 4 costs 10k.");
        let speakers: Vec<_> = state.messages().iter().map(|m| m.name.as_deref()).collect();
        assert_eq!(speakers, vec![None, Some("Legal"), Some("Finance")]);
        assert_eq!(state.outputs().len(), 2);
        assert_eq!(state.status(), ExecutionStatus::Done);

        let calls = gateway.calls();
        assert!(calls[3].history.iter().any(|m| m.content == "Clause 4 limits liability."));
        assert!(calls[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_turn_ceiling_bounds_routing() {
        let gateway = Arc::new(ScriptedGateway::new(["Legal", "one", "Legal", "two"]));
        let config = EngineConfig {
            max_route_turns: 2,
            ..Default::default()
        };
        let mut state = ExecutionState::for_request(vec![], "loop forever");

        let answer = supervisor(&gateway, config).run(&mut state).await.unwrap();

        assert_eq!(answer, "two");
        assert_eq!(gateway.call_count(), 4);
    }

    #[tokio::test]
    async fn test_failed_worker_keeps_its_steps_in_trace() {
        let mut tools = ToolRegistry::new();
        tools.register_fn(
            ToolSchema {
                name: "lookup".into(),
                description: "Look up a clause".into(),
                parameters: vec![],
            },
            |_| async move { Ok("found it".to_string()) },
        );
        let workers = Roster::new(vec![
            AgentConfig::new("a-1", "Legal").with_tool("lookup"),
            AgentConfig::new("a-2", "Finance"),
        ]);
        let gateway = Arc::new(ScriptedGateway::from_script([
            Scripted::text("Legal"),
            Scripted::text(ScriptedGateway::tool_block("lookup", json!({}))),
            Scripted::unavailable(),
        ]));
        let config = EngineConfig {
            structured_routing: false,
            ..Default::default()
        };
        let mut state = ExecutionState::for_request(vec![], "compare clauses");

        let result = Supervisor::new(gateway.clone(), Arc::new(tools), workers, Arc::new(config))
            .run(&mut state)
            .await;

        assert!(matches!(result, Err(AgentError::ModelUnavailable(_))));
        assert_eq!(state.status(), ExecutionStatus::Error);
        assert_eq!(state.messages()[0].content, "compare clauses");
        assert!(state.messages()[1].tool_call.is_some());
        assert!(state
            .messages()
            .iter()
            .any(|m| m.role == Role::Tool && m.content == "found it"));
    }

    #[tokio::test]
    async fn test_unavailable_supervisor_fails() {
        let gateway = Arc::new(ScriptedGateway::from_script([Scripted::unavailable()]));
        let mut state = ExecutionState::for_request(vec![], "q");

        let result = supervisor(&gateway, EngineConfig::default()).run(&mut state).await;

        assert!(matches!(result, Err(AgentError::ModelUnavailable(_))));
        assert_eq!(state.status(), ExecutionStatus::Error);
        assert_eq!(state.len(), 1);
    }
}
