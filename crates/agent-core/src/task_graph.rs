//! Task Graph: plan, execute in parallel, synthesize
//!
//! A fixed three-phase shape parameterized by the roster. The planner posts
//! one [`Task`] per agent to that agent's mailbox; every agent then runs its
//! own reasoning loop concurrently; the synthesizer combines their outputs.
//!
//! Branch results are merged in roster order, never completion order, so the
//! synthesis input does not depend on scheduling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::agent::Roster;
use crate::config::EngineConfig;
use crate::error::{AgentError, Result};
use crate::gateway::{complete_within, GenerationOptions, ModelGateway};
use crate::mailbox::{Envelope, Mailboxes};
use crate::message::{Message, Role};
use crate::prompt;
use crate::reasoning::ReasoningLoop;
use crate::state::{ExecutionState, ExecutionStatus};
use crate::tool::ToolRegistry;

/// Speaker name of the planning phase
pub const PLANNER: &str = "Planner";

/// Speaker name of the synthesis phase
pub const SYNTHESIZER: &str = "Synthesizer";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// One unit of planned work; `assigned_to` is always a roster agent id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub assigned_to: String,
    pub status: TaskStatus,
}

/// Result of a fan-out execution
#[derive(Clone, Debug)]
pub struct FanOutOutcome {
    pub answer: String,
    pub tasks: Vec<Task>,
}

/// `Task N: description - Assigned to: Name` lines of a planning reply
fn parse_assignments(plan: &str) -> Vec<(String, String)> {
    const ASSIGNED: &str = "assigned to:";

    plan.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['*', '-', '#', ' ']);
            let lower = line.to_ascii_lowercase();
            if !lower.starts_with("task") {
                return None;
            }
            let colon = line.find(':')?;
            let split = lower.find(ASSIGNED)?;
            if split <= colon {
                return None;
            }
            let description = line[colon + 1..split]
                .trim()
                .trim_end_matches(|c: char| c == '-' || c == '|' || c.is_whitespace())
                .trim_matches('*')
                .trim();
            let name = line[split + ASSIGNED.len()..]
                .trim()
                .trim_matches(|c: char| matches!(c, '[' | ']' | '*' | '.'))
                .trim();
            (!description.is_empty() && !name.is_empty())
                .then(|| (description.to_string(), name.to_string()))
        })
        .collect()
}

/// One task per roster agent, described from the plan where it names the agent
pub fn build_tasks(plan: &str, roster: &Roster) -> Vec<Task> {
    let assignments = parse_assignments(plan);

    roster
        .agents()
        .iter()
        .enumerate()
        .map(|(index, agent)| {
            let description = assignments
                .iter()
                .find(|(_, name)| roster.resolve(name).is_some_and(|(i, _)| i == index))
                .map_or_else(
                    || format!("Analyze request using {}", agent.name),
                    |(description, _)| description.clone(),
                );
            Task {
                id: format!("task_{}", index + 1),
                description,
                assigned_to: agent.id.clone(),
                status: TaskStatus::Pending,
            }
        })
        .collect()
}

/// Labeled worker outputs in roster order
pub fn synthesis_input(roster: &Roster, outputs: &HashMap<String, String>) -> String {
    roster
        .agents()
        .iter()
        .filter_map(|agent| {
            outputs
                .get(&agent.id)
                .map(|output| format!("=== {} ===\n{output}", agent.name))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

type BranchResult = (usize, ExecutionState, Result<String>);

/// Plan → parallel execute → synthesize over a fixed roster
pub struct TaskGraph {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    roster: Roster,
    config: Arc<EngineConfig>,
    knowledge: Option<String>,
}

impl TaskGraph {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        roster: Roster,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            gateway,
            tools,
            roster,
            config,
            knowledge: None,
        }
    }

    #[must_use]
    pub fn with_knowledge(mut self, knowledge: Option<String>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub async fn run(&self, state: &mut ExecutionState) -> Result<FanOutOutcome> {
        if self.roster.is_empty() {
            state.set_status(ExecutionStatus::Error);
            return Err(AgentError::InvalidRequest("fan-out needs at least one agent".into()));
        }
        state.set_status(ExecutionStatus::Running);

        let user_message = state
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        tracing::info!(agents = self.roster.len(), "Phase 1: planning");
        let plan = match self.engine_call(prompt::planning_prompt(&user_message, &self.roster), &user_message).await {
            Ok(plan) => plan,
            Err(err) => return Self::fail(state, err),
        };
        state.push(Message::assistant(format!("Task Planning Complete:\n{plan}")).with_name(PLANNER));
        let mut tasks = build_tasks(&plan, &self.roster);

        tracing::info!(tasks = tasks.len(), "Phase 2: parallel execution");
        let outputs = match self.execute(state, &user_message, &tasks).await {
            Ok(outputs) => outputs,
            Err(err) => return Self::fail(state, err),
        };
        for task in &mut tasks {
            if outputs.contains_key(&task.assigned_to) {
                task.status = TaskStatus::Completed;
            }
        }

        tracing::info!("Phase 3: synthesis");
        let sections = synthesis_input(&self.roster, &outputs);
        let answer = match self.engine_call(prompt::synthesis_prompt(&user_message, &sections), &user_message).await {
            Ok(answer) => answer,
            Err(err) => return Self::fail(state, err),
        };
        state.push(Message::assistant(answer.clone()).with_name(SYNTHESIZER));
        state.set_status(ExecutionStatus::Done);

        Ok(FanOutOutcome { answer, tasks })
    }

    /// Planner and synthesizer calls: no tools, engine default model
    async fn engine_call(&self, system_prompt: String, user_message: &str) -> Result<String> {
        let reply = complete_within(
            self.gateway.as_ref(),
            self.config.model_timeout(),
            &system_prompt,
            &[Message::user(user_message)],
            &[],
            &GenerationOptions::for_model(&self.config.default_model),
        )
        .await?;
        Ok(reply.content)
    }

    async fn execute(
        &self,
        state: &mut ExecutionState,
        user_message: &str,
        tasks: &[Task],
    ) -> Result<HashMap<String, String>> {
        let mut mailboxes = Mailboxes::open(
            self.roster.agents().iter().map(|a| a.id.clone()),
            self.config.mailbox_capacity,
        );
        for task in tasks {
            if let Err(err) = mailboxes.send(Envelope::new(PLANNER, &task.assigned_to, &task.description)) {
                tracing::warn!(task = %task.id, error = %err, "Task could not be posted");
            }
        }

        let outputs: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut join_set: JoinSet<BranchResult> = JoinSet::new();
        let depth = state.depth();

        for (index, agent) in self.roster.agents().iter().enumerate() {
            let inbox = mailboxes.take_inbox(&agent.id);
            let reasoning = ReasoningLoop::new(
                Arc::clone(&self.gateway),
                Arc::clone(&self.tools),
                agent.clone(),
                Arc::clone(&self.config),
            )
            .with_system_prompt(prompt::worker_prompt(agent, self.knowledge.as_deref()));
            let outputs = Arc::clone(&outputs);
            let user_message = user_message.to_string();
            let agent_id = agent.id.clone();

            join_set.spawn(async move {
                let assignments: Vec<String> = inbox
                    .map(|mut inbox| inbox.drain().into_iter().map(|e| e.content).collect())
                    .unwrap_or_default();

                let mut branch = ExecutionState::new(depth);
                branch.push(Message::user(prompt::worker_request(&user_message, &assignments)));
                let result = reasoning.run(&mut branch).await;

                if let Ok(answer) = &result {
                    outputs
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(agent_id, answer.clone());
                }
                (index, branch, result)
            });
        }

        let mut branches: Vec<Option<(ExecutionState, Result<String>)>> =
            std::iter::repeat_with(|| None).take(self.roster.len()).collect();
        let mut failure: Option<AgentError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, branch, result)) => {
                    tracing::debug!(branch = index, ok = result.is_ok(), "Branch finished");
                    if let Some(slot) = branches.get_mut(index) {
                        *slot = Some((branch, result));
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Branch task aborted");
                    failure.get_or_insert(AgentError::Internal(format!("worker branch aborted: {err}")));
                }
            }
        }

        // Roster order; the seeded request of each branch stays private
        for (agent, slot) in self.roster.agents().iter().zip(branches) {
            let Some((branch, result)) = slot else {
                continue;
            };
            state.extend(branch.into_messages().into_iter().skip(1));
            if let Err(err) = result {
                tracing::warn!(agent = %agent.name, error = %err, "Branch failed");
                failure.get_or_insert(err);
            }
        }

        // Successful branches keep their outputs even when another one failed
        let outputs = outputs.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for agent in self.roster.agents() {
            if let Some(output) = outputs.get(&agent.id) {
                state.set_output(&agent.id, output.clone());
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }

    fn fail(state: &mut ExecutionState, err: AgentError) -> Result<FanOutOutcome> {
        tracing::error!(error = %err, "Fan-out execution failed");
        state.set_status(ExecutionStatus::Error);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::testing::{RecordedCall, Scripted, ScriptedGateway};
    use std::time::Duration;

    const PLAN: &str = "Here is the plan:\nTask 1: Review liability clauses - Assigned to: Legal\nTask 2: Price the clauses - Assigned to: [Finance]";

    fn roster() -> Roster {
        Roster::new(vec![AgentConfig::new("a-1", "Legal"), AgentConfig::new("a-2", "Finance")])
    }

    fn graph(gateway: &Arc<ScriptedGateway>) -> TaskGraph {
        TaskGraph::new(
            gateway.clone(),
            Arc::new(ToolRegistry::new()),
            roster(),
            Arc::new(EngineConfig::default()),
        )
        .with_knowledge(Some("Contract v2".into()))
    }

    /// Planner, workers and synthesizer told apart by their system prompt
    fn fan_out_gateway(legal_delay: u64, finance_delay: u64) -> ScriptedGateway {
        ScriptedGateway::responding(move |call: &RecordedCall| {
            let prompt = &call.system_prompt;
            if prompt.contains("create a task breakdown") {
                Scripted::text(PLAN)
            } else if prompt.contains("Synthesize") {
                Scripted::text("Combined answer.")
            } else if prompt.starts_with("You are Legal") {
                Scripted::text("Clause 4 caps liability.").after(Duration::from_millis(legal_delay))
            } else {
                Scripted::text("Clause 4 costs 10k.").after(Duration::from_millis(finance_delay))
            }
        })
    }

    fn synthesis_call(gateway: &ScriptedGateway) -> RecordedCall {
        gateway
            .calls()
            .into_iter()
            .find(|c| c.system_prompt.contains("Synthesize"))
            .unwrap()
    }

    #[test]
    fn test_build_tasks_one_per_agent() {
        let tasks = build_tasks(PLAN, &roster());
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "task_1");
        assert_eq!(tasks[0].description, "Review liability clauses");
        assert_eq!(tasks[1].assigned_to, "a-2");
        assert_eq!(tasks[1].description, "Price the clauses");
    }

    #[test]
    fn test_build_tasks_defaults_for_unplanned_agents() {
        let tasks = build_tasks("Task 1: Do everything - Assigned to: Marketing", &roster());
        assert_eq!(tasks[0].description, "Analyze request using Legal");
        assert_eq!(tasks[1].description, "Analyze request using Finance");
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_input_invariant_to_completion_order() {
        let mut prompts = Vec::new();
        let mut traces = Vec::new();

        for (legal, finance) in [(30, 10), (10, 30)] {
            let gateway = Arc::new(fan_out_gateway(legal, finance));
            let mut state = ExecutionState::for_request(vec![], "compare clauses");

            let outcome = graph(&gateway).run(&mut state).await.unwrap();
            assert_eq!(outcome.answer, "Combined answer.");
            assert!(outcome.tasks.iter().all(|t| t.status == TaskStatus::Completed));

            prompts.push(synthesis_call(&gateway).system_prompt);
            traces.push(
                state
                    .messages()
                    .iter()
                    .map(|m| (m.name.clone(), m.content.clone()))
                    .collect::<Vec<_>>(),
            );
        }

        assert_eq!(prompts[0], prompts[1]);
        assert_eq!(traces[0], traces[1]);
        let legal = prompts[0].find("=== Legal ===\nClause 4 caps liability.").unwrap();
        let finance = prompts[0].find("=== Finance ===\nClause 4 costs 10k.").unwrap();
        assert!(legal < finance);
    }

    #[tokio::test]
    async fn test_workers_receive_planned_tasks() {
        let gateway = Arc::new(fan_out_gateway(0, 0));
        let mut state = ExecutionState::for_request(vec![], "compare clauses");

        graph(&gateway).run(&mut state).await.unwrap();

        let finance = gateway
            .calls()
            .into_iter()
            .find(|c| c.system_prompt.starts_with("You are Finance"))
            .unwrap();
        assert!(finance.system_prompt.contains("Contract v2"));
        assert!(finance.history[0].content.contains("- Price the clauses"));

        let speakers: Vec<_> = state.messages().iter().map(|m| m.name.as_deref()).collect();
        assert_eq!(
            speakers,
            vec![None, Some(PLANNER), Some("Legal"), Some("Finance"), Some(SYNTHESIZER)]
        );
        assert_eq!(state.outputs().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_branch_fails_run_with_partial_trace() {
        let gateway = Arc::new(ScriptedGateway::responding(|call: &RecordedCall| {
            if call.system_prompt.contains("create a task breakdown") {
                Scripted::text(PLAN)
            } else if call.system_prompt.starts_with("You are Finance") {
                Scripted::unavailable()
            } else {
                Scripted::text("Clause 4 caps liability.")
            }
        }));
        let mut state = ExecutionState::for_request(vec![], "compare clauses");

        let result = graph(&gateway).run(&mut state).await;

        assert!(matches!(result, Err(AgentError::ModelUnavailable(_))));
        assert_eq!(state.status(), ExecutionStatus::Error);
        assert!(state.messages().iter().any(|m| m.content == "Clause 4 caps liability."));
        assert_eq!(state.outputs()["a-1"], "Clause 4 caps liability.");
        assert!(!state.outputs().contains_key("a-2"));
        assert!(!gateway.calls().iter().any(|c| c.system_prompt.contains("Synthesize")));
    }
}
