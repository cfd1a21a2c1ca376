//! Execution State
//!
//! Owned by exactly one reasoning loop or supervisor for the duration of an
//! execution, then handed to the caller for persistence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// Lifecycle of one execution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

/// Message trace and counters of one execution
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    messages: Vec<Message>,
    depth: u32,
    iteration_count: u32,
    #[serde(default)]
    outputs: HashMap<String, String>,
    status: ExecutionStatus,
}

impl ExecutionState {
    /// Fresh state at the given delegation depth
    pub fn new(depth: u32) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Top-level state seeded with prior history and the user's request
    pub fn for_request(history: Vec<Message>, user_message: impl Into<String>) -> Self {
        let mut state = Self::new(0);
        state.messages = history;
        state.push(Message::user(user_message));
        state
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Count one completed act/observe cycle
    pub fn record_iteration(&mut self) -> u32 {
        self.iteration_count += 1;
        self.iteration_count
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ExecutionStatus) {
        self.status = status;
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    /// Record one agent's output; each agent owns its own key
    pub fn set_output(&mut self, agent_id: impl Into<String>, output: impl Into<String>) {
        self.outputs.insert(agent_id.into(), output.into());
    }

    /// Content of the last assistant message
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_call.is_none())
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Arguments, ToolCall};

    #[test]
    fn test_round_trip_preserves_trace() {
        let mut state = ExecutionState::for_request(vec![], "compare clauses");
        state.push(Message::tool_request("", ToolCall::new("query_data", Arguments::new())));
        state.push(Message::tool("query_data", "Error: connection refused"));
        state.push(Message::assistant("Clause 4 differs.").with_name("Legal"));
        state.record_iteration();
        state.set_output("a-1", "Clause 4 differs.");
        state.set_status(ExecutionStatus::Done);

        let json = serde_json::to_string(&state).unwrap();
        let restored: ExecutionState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.messages(), state.messages());
        for (a, b) in restored.messages().iter().zip(state.messages()) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.content, b.content);
            assert_eq!(a.name, b.name);
        }
        assert_eq!(restored.iteration_count(), 1);
        assert_eq!(restored.status(), ExecutionStatus::Done);
        assert_eq!(restored.outputs().get("a-1").map(String::as_str), Some("Clause 4 differs."));
    }

    #[test]
    fn test_last_answer_skips_tool_requests() {
        let mut state = ExecutionState::for_request(vec![], "q");
        state.push(Message::assistant("draft"));
        state.push(Message::tool_request("", ToolCall::new("x", Arguments::new())));
        assert_eq!(state.last_answer(), Some("draft"));
    }
}
