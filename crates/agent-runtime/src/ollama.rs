//! Ollama Model Gateway
//!
//! Implementation of `ModelGateway` for local Ollama inference. Ollama chat
//! has no tool calling we rely on, so tools travel through the text
//! protocol: described in the system prompt, requested with a fenced block.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    gateway::{GenerationOptions, ModelGateway, ModelInfo},
    message::{Message, Role},
    protocol,
    tool::ToolSchema,
};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage, MessageRole},
    models::ModelOptions,
    Ollama,
};

/// Ollama gateway configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);
        let timeout_secs = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(120);

        Self {
            host,
            port,
            timeout_secs,
        }
    }
}

/// Ollama model gateway
pub struct OllamaGateway {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaGateway {
    /// Create a new Ollama gateway with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// System prompt plus tool section, then the history in Ollama format
    fn convert_messages(system_prompt: &str, history: &[Message], tools: &[ToolSchema]) -> Vec<ChatMessage> {
        let tool_section = protocol::render_tool_section(tools);
        let system = if tool_section.is_empty() {
            system_prompt.to_string()
        } else {
            format!("{system_prompt}\n\n{tool_section}")
        };

        std::iter::once(ChatMessage::new(MessageRole::System, system))
            .chain(history.iter().map(Self::convert_message))
            .collect()
    }

    fn convert_message(message: &Message) -> ChatMessage {
        match message.role {
            Role::System => ChatMessage::new(MessageRole::System, message.content.clone()),
            Role::User => ChatMessage::new(MessageRole::User, message.content.clone()),
            Role::Assistant => {
                ChatMessage::new(MessageRole::Assistant, protocol::render_tool_call(message))
            }
            // Tool results appear as user context
            Role::Tool => ChatMessage::new(
                MessageRole::User,
                format!(
                    "[Tool '{}' returned]\n{}",
                    message.name.as_deref().unwrap_or("tool"),
                    message.content
                ),
            ),
        }
    }

    /// Build Ollama model options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Message> {
        let request = ChatMessageRequest::new(
            options.model.clone(),
            Self::convert_messages(system_prompt, history, tools),
        )
        .options(Self::build_options(options));

        tracing::debug!(model = %options.model, messages = history.len(), tools = tools.len(), "Ollama chat request");

        let deadline = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(deadline, self.client.send_chat_messages(request))
            .await
            .map_err(|_| {
                AgentError::ModelUnavailable(format!("Ollama did not answer within {}s", self.config.timeout_secs))
            })?
            .map_err(|e| AgentError::ModelUnavailable(e.to_string()))?;

        Ok(protocol::parse_reply(&response.message.content, tools))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ModelUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::{Arguments, ParameterSchema, ToolCall};

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn test_message_conversion() {
        let tools = vec![ToolSchema {
            name: "query_data".into(),
            description: "Run SQL".into(),
            parameters: vec![ParameterSchema::string("sql_query", "SQL", true)],
        }];
        let history = vec![
            Message::user("Total cost?"),
            Message::tool_request("", ToolCall::new("query_data", Arguments::new())),
            Message::tool("query_data", "42"),
        ];

        let converted = OllamaGateway::convert_messages("You are helpful.", &history, &tools);

        assert_eq!(converted.len(), 4);
        assert!(converted[0].content.contains("### query_data"));
        assert!(converted[2].content.contains("```tool"));
        assert_eq!(converted[3].content, "[Tool 'query_data' returned]\n42");
    }

    #[test]
    fn test_plain_chat_has_no_tool_section() {
        let converted = OllamaGateway::convert_messages("You are helpful.", &[Message::user("hi")], &[]);
        assert_eq!(converted[0].content, "You are helpful.");
    }
}
