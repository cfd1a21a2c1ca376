//! Test doubles for the model gateway

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::gateway::{GenerationOptions, ModelGateway};
use crate::message::Message;
use crate::protocol;
use crate::tool::ToolSchema;

/// One observed `complete` call
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub tools: Vec<String>,
}

/// What the gateway answers with, and after how long
pub struct Scripted {
    pub reply: Result<String>,
    pub delay: Duration,
}

impl Scripted {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: Err(AgentError::ModelUnavailable("connection refused".into())),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&RecordedCall) -> Scripted + Send + Sync;

/// Replays canned model output. Raw text goes through the text tool-call
/// protocol, so scripts can request tools with a fenced block.
pub struct ScriptedGateway {
    queue: Mutex<VecDeque<Scripted>>,
    responder: Option<Arc<Responder>>,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_script(replies.into_iter().map(Scripted::text))
    }

    pub fn from_script(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            queue: Mutex::new(script.into_iter().collect()),
            responder: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer each call by inspecting it, for concurrent callers
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Scripted + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Arc::new(responder)),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// A tool request in the text protocol
    pub fn tool_block(tool: &str, arguments: serde_json::Value) -> String {
        format!(
            "```tool\n{}\n```",
            serde_json::json!({ "tool": tool, "arguments": arguments })
        )
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSchema],
        _options: &GenerationOptions,
    ) -> Result<Message> {
        let call = RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        };

        let scripted = match &self.responder {
            Some(responder) => responder(&call),
            None => self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Scripted {
                    reply: Err(AgentError::Model("script exhausted".into())),
                    delay: Duration::ZERO,
                }),
        };
        self.calls.lock().unwrap().push(call);

        let delay = self.delay + scripted.delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        scripted.reply.map(|text| protocol::parse_reply(&text, tools))
    }
}
