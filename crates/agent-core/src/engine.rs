//! Execution Entry Point
//!
//! [`Orchestrator::run`] picks the execution shape from the request mode and
//! always answers with a [`RunResult`]. Failures become `status: error` with
//! the partial trace attached; persistence runs afterwards and cannot change
//! the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::Roster;
use crate::config::EngineConfig;
use crate::delegation::{ConsultTool, CONSULT_TOOL};
use crate::error::{AgentError, Result};
use crate::gateway::ModelGateway;
use crate::message::Message;
use crate::plan::{parse_plan, PlanItem};
use crate::prompt::{self, SelectedSource};
use crate::reasoning::ReasoningLoop;
use crate::session::{title_for, SessionId, SessionStore, SessionUpdate};
use crate::state::ExecutionState;
use crate::supervisor::Supervisor;
use crate::task_graph::{Task, TaskGraph};
use crate::tool::ToolRegistry;

/// Execution shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// First roster agent leads, the rest are consultable specialists
    #[default]
    Single,
    /// Supervisor routes among the roster
    Supervised,
    /// Plan, run every agent concurrently, synthesize
    #[serde(alias = "fan-out", alias = "fanout")]
    FanOut,
}

/// One request to the engine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunRequest {
    pub user_message: String,
    pub roster: Roster,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub knowledge_context: Option<String>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub selected_source: Option<SelectedSource>,
}

impl RunRequest {
    pub fn new(user_message: impl Into<String>, roster: Roster) -> Self {
        Self {
            user_message: user_message.into(),
            roster,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_knowledge(mut self, knowledge: impl Into<String>) -> Self {
        self.knowledge_context = Some(knowledge.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn with_selected_source(mut self, source: SelectedSource) -> Self {
        self.selected_source = Some(source);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Structured outcome of every execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub final_answer: String,
    pub trace: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan: Vec<PlanItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Shared, read-only engine handle; safe to run many requests concurrently
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    config: Arc<EngineConfig>,
    store: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    /// `tools` is the startup registry; `consult` is added per request
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: ToolRegistry, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tools = tools.with_timeout(config.tool_timeout());
        Ok(Self {
            gateway,
            tools: Arc::new(tools),
            config: Arc::new(config),
            store: None,
        })
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    pub async fn run(&self, request: RunRequest) -> RunResult {
        let history = self.load_history(&request).await;
        let prior = history.len();
        let mut state = ExecutionState::for_request(history, request.user_message.clone());

        tracing::info!(
            mode = ?request.mode,
            agents = request.roster.len(),
            session_id = request.session_id.as_ref().map(SessionId::as_str),
            "Execution started"
        );

        let mut tasks = Vec::new();
        let outcome = if request.roster.is_empty() {
            Err(AgentError::InvalidRequest("the roster has no agents".into()))
        } else {
            match request.mode {
                RunMode::Single => self.run_single(&request, &mut state).await,
                RunMode::Supervised => {
                    Supervisor::new(
                        self.gateway.clone(),
                        self.tools.clone(),
                        request.roster.clone(),
                        self.config.clone(),
                    )
                    .with_knowledge(request.knowledge_context.clone())
                    .run(&mut state)
                    .await
                }
                RunMode::FanOut => TaskGraph::new(
                    self.gateway.clone(),
                    self.tools.clone(),
                    request.roster.clone(),
                    self.config.clone(),
                )
                .with_knowledge(request.knowledge_context.clone())
                .run(&mut state)
                .await
                .map(|outcome| {
                    tasks = outcome.tasks;
                    outcome.answer
                }),
            }
        };

        let plan = outcome.as_deref().map(parse_plan).unwrap_or_default();

        if let Some(session_id) = &request.session_id {
            self.persist(session_id, &state.messages()[prior..], &plan).await;
        }

        let outputs = state.outputs().clone();
        let trace = state.into_messages();
        match outcome {
            Ok(final_answer) => {
                tracing::info!(messages = trace.len(), "Execution finished");
                RunResult {
                    status: RunStatus::Success,
                    final_answer,
                    trace,
                    plan,
                    tasks,
                    outputs,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, messages = trace.len(), "Execution failed");
                RunResult {
                    status: RunStatus::Error,
                    final_answer: err.user_message(),
                    trace,
                    plan,
                    tasks,
                    outputs,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Lead agent with the remaining roster as consultable specialists
    async fn run_single(&self, request: &RunRequest, state: &mut ExecutionState) -> Result<String> {
        let Some(lead) = request.roster.first() else {
            return Err(AgentError::InvalidRequest("the roster has no agents".into()));
        };
        let specialists = request.roster.without(0);

        let system_prompt = prompt::lead_prompt(
            lead,
            &specialists,
            request.knowledge_context.as_deref(),
            request.selected_source.as_ref(),
        );

        let (lead, tools) = if specialists.is_empty() {
            (lead.clone(), self.tools.clone())
        } else {
            let consult = ConsultTool::new(
                specialists,
                self.tools.clone(),
                self.gateway.clone(),
                self.config.clone(),
            );
            (
                lead.clone().with_tool(CONSULT_TOOL),
                Arc::new(self.tools.extended(Arc::new(consult))),
            )
        };

        ReasoningLoop::new(self.gateway.clone(), tools, lead, self.config.clone())
            .with_system_prompt(system_prompt)
            .run(state)
            .await
    }

    /// Prior session messages; single mode only
    async fn load_history(&self, request: &RunRequest) -> Vec<Message> {
        let (Some(store), Some(session_id)) = (&self.store, &request.session_id) else {
            return Vec::new();
        };
        if request.mode != RunMode::Single {
            return Vec::new();
        }
        match store.messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "Failed to load session history");
                Vec::new()
            }
        }
    }

    /// Best-effort write of the new messages and session metadata
    async fn persist(&self, session_id: &SessionId, messages: &[Message], plan: &[PlanItem]) {
        let Some(store) = &self.store else {
            return;
        };

        for message in messages {
            if let Err(err) = store.append(session_id, message).await {
                tracing::error!(session_id = %session_id, error = %err, "Failed to persist message");
                return;
            }
        }

        let update = SessionUpdate {
            title: title_for(messages),
            plan: (!plan.is_empty()).then(|| plan.to_vec()),
            ..SessionUpdate::touched()
        };
        if let Err(err) = store.update_session(session_id, update).await {
            tracing::warn!(session_id = %session_id, error = %err, "Failed to update session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::message::Role;
    use crate::session::MemorySessionStore;
    use crate::testing::{Scripted, ScriptedGateway};
    use async_trait::async_trait;
    use serde_json::json;

    fn roster() -> Roster {
        Roster::new(vec![
            AgentConfig::new("pm", "Project Manager"),
            AgentConfig::new("a-2", "Senior Data Analyst").with_description("SQL over Excel data"),
        ])
    }

    fn orchestrator(gateway: &Arc<ScriptedGateway>) -> Orchestrator {
        Orchestrator::new(gateway.clone(), ToolRegistry::new(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_zero_iteration_ceiling() {
        let gateway: Arc<dyn ModelGateway> = Arc::new(ScriptedGateway::new(["unused"]));
        let config = EngineConfig {
            max_iterations: 0,
            ..Default::default()
        };
        let result = Orchestrator::new(gateway, ToolRegistry::new(), config);
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn append(&self, _: &SessionId, _: &Message) -> Result<()> {
            Err(AgentError::Session("database offline".into()))
        }

        async fn update_session(&self, _: &SessionId, _: SessionUpdate) -> Result<()> {
            Err(AgentError::Session("database offline".into()))
        }

        async fn messages(&self, _: &SessionId) -> Result<Vec<Message>> {
            Err(AgentError::Session("database offline".into()))
        }
    }

    #[tokio::test]
    async fn test_single_mode_consults_specialist() {
        let gateway = Arc::new(ScriptedGateway::new([
            ScriptedGateway::tool_block(
                CONSULT_TOOL,
                json!({"specialist_name": "Senior Data Analyst", "question": "Total PO cost?"}),
            ),
            "The total is 42.".to_string(),
            "[PLAN]:\n- [x] Ask the analyst\n\nTotal PO cost is 42.".to_string(),
        ]));

        let result = orchestrator(&gateway)
            .run(RunRequest::new("What is the total PO cost?", roster()))
            .await;

        assert!(result.is_success());
        assert!(result.final_answer.ends_with("Total PO cost is 42."));
        assert_eq!(result.plan, vec![PlanItem { text: "Ask the analyst".into(), completed: true }]);

        let observation = result.trace.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(observation.content, "Response from Senior Data Analyst:\nThe total is 42.");

        let calls = gateway.calls();
        assert_eq!(calls[0].tools, vec![CONSULT_TOOL]);
        assert!(calls[0].system_prompt.contains("AVAILABLE SPECIALISTS"));
        assert!(calls[1].tools.is_empty());
    }

    #[tokio::test]
    async fn test_model_unavailable_is_error_result_with_trace() {
        let gateway = Arc::new(ScriptedGateway::from_script([Scripted::unavailable()]));

        let result = orchestrator(&gateway)
            .run(RunRequest::new("hello", roster()))
            .await;

        assert_eq!(result.status, RunStatus::Error);
        assert!(result.error.unwrap().contains("Model unavailable"));
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].content, "hello");
    }

    #[tokio::test]
    async fn test_empty_roster_is_error_result() {
        let gateway = Arc::new(ScriptedGateway::new(["unused"]));
        let result = orchestrator(&gateway)
            .run(RunRequest::new("hello", Roster::default()))
            .await;
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_session_history_and_persistence() {
        let store = Arc::new(MemorySessionStore::new());
        let session = SessionId::from_string("s-1");
        store.append(&session, &Message::user("earlier question")).await.unwrap();
        store.append(&session, &Message::assistant("earlier answer")).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::new(["Follow-up answer."]));
        let engine = orchestrator(&gateway).with_store(store.clone());

        let result = engine
            .run(RunRequest::new("follow-up", roster()).with_session(session.clone()))
            .await;

        assert!(result.is_success());
        assert_eq!(gateway.calls()[0].history.len(), 3);

        let persisted = store.messages(&session).await.unwrap();
        let contents: Vec<_> = persisted.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["earlier question", "earlier answer", "follow-up", "Follow-up answer."]
        );
        let stored = store.session(&session).unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("follow-up"));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_change_status() {
        let gateway = Arc::new(ScriptedGateway::new(["Answer."]));
        let engine = orchestrator(&gateway).with_store(Arc::new(FailingStore));

        let result = engine
            .run(RunRequest::new("q", roster()).with_session(SessionId::new()))
            .await;

        assert!(result.is_success());
        assert_eq!(result.final_answer, "Answer.");
    }

    #[test]
    fn test_request_accepts_fan_out_spelling() {
        let request: RunRequest = serde_json::from_value(json!({
            "user_message": "compare clauses",
            "roster": [{"id": "a-1", "name": "Legal"}],
            "mode": "fan-out"
        }))
        .unwrap();
        assert_eq!(request.mode, RunMode::FanOut);
        assert_eq!(request.roster.len(), 1);
    }
}
