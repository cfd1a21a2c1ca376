//! Model Gateway
//!
//! Uniform call contract to a model: system prompt and history in, one
//! assistant [`Message`] out. The returned message is either a final answer or
//! a tool-call request. Implementations must support an empty tool set (plain
//! chat) as well as a non-empty one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::gateway::{ModelGateway, GenerationOptions};
//!
//! let gateway = OllamaGateway::from_env();
//! let reply = gateway.complete(&system_prompt, &history, &tools, &options).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::ToolSchema;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "qwen3:latest", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "qwen3:latest".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

impl GenerationOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Deterministic sampling, used for routing decisions
    #[must_use]
    pub fn deterministic(mut self) -> Self {
        self.temperature = 0.0;
        self
    }
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Strategy trait for model backends
///
/// Transport failures (timeout, refused connection) must surface as
/// [`AgentError::ModelUnavailable`]; the engine treats that as fatal.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Produce the next assistant message
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Message>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

/// Call the gateway under a deadline; an elapsed deadline is `ModelUnavailable`
pub async fn complete_within(
    gateway: &dyn ModelGateway,
    deadline: Duration,
    system_prompt: &str,
    history: &[Message],
    tools: &[ToolSchema],
    options: &GenerationOptions,
) -> Result<Message> {
    match tokio::time::timeout(deadline, gateway.complete(system_prompt, history, tools, options)).await
    {
        Ok(reply) => reply,
        Err(_) => {
            tracing::error!(gateway = gateway.name(), model = %options.model, secs = deadline.as_secs(), "Model call timed out");
            Err(AgentError::ModelUnavailable(format!(
                "{} did not answer within {}s",
                gateway.name(),
                deadline.as_secs()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGateway;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "qwen3:latest");
        assert!(GenerationOptions::for_model("llama3").deterministic().temperature.abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_model_unavailable() {
        let gateway = ScriptedGateway::new(["too late"]).with_delay(Duration::from_secs(30));
        let result = complete_within(
            &gateway,
            Duration::from_secs(5),
            "system",
            &[Message::user("hi")],
            &[],
            &GenerationOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(AgentError::ModelUnavailable(_))));
    }
}
