//! Tool System
//!
//! Tools are registered once at startup and invoked by the reasoning loop.
//! The registry guarantees name resolution, per-agent permission checks and
//! uniform error shaping: a handler fault, panic or timeout always comes back
//! as a [`ToolError`], never as an unwinding fault in the caller.

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Tool arguments as a JSON object
pub type Arguments = serde_json::Map<String, Value>;

/// Default handler deadline
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool", alias = "tool_name")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Arguments,

    /// Optional call ID for tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// String argument, if present
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Required string argument
    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.str_arg(key).ok_or_else(|| ToolError::InvalidArguments {
            tool: self.name.clone(),
            reason: format!("missing string parameter '{key}'"),
        })
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required,
            enum_values: None,
        }
    }

    pub fn with_enum(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        type_ok
            && self
                .enum_values
                .as_ref()
                .is_none_or(|allowed| allowed.contains(value))
    }
}

/// Tool descriptor handed to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Check arguments against the declared parameters
    pub fn validate(&self, call: &ToolCall) -> Result<(), ToolError> {
        for param in &self.parameters {
            match call.arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::InvalidArguments {
                        tool: self.name.clone(),
                        reason: format!("missing required parameter '{}'", param.name),
                    });
                }
                Some(value) if !value.is_null() && !param.accepts(value) => {
                    return Err(ToolError::InvalidArguments {
                        tool: self.name.clone(),
                        reason: format!(
                            "parameter '{}' must be a {}{}",
                            param.name,
                            param.param_type,
                            param
                                .enum_values
                                .as_ref()
                                .map(|v| format!(" in {}", Value::Array(v.clone())))
                                .unwrap_or_default()
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Per-invocation data carried from the calling loop into the handler
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Agent whose loop issued the call
    pub agent_id: String,

    /// Delegation depth of the calling loop
    pub depth: u32,
}

impl ToolContext {
    pub fn new(agent_id: impl Into<String>, depth: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            depth,
        }
    }
}

/// Tool trait - implement to add new capabilities
///
/// Handlers report their own failures as [`ToolError`]; the registry catches
/// anything that escapes anyway.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError>;

    /// Deadline override; the registry default applies when `None`
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

type HandlerFn = dyn Fn(Arguments) -> futures::future::BoxFuture<'static, Result<String, ToolError>>
    + Send
    + Sync;

/// Adapter turning a plain async closure into a [`Tool`]
pub struct FnTool {
    schema: ToolSchema,
    handler: Box<HandlerFn>,
}

impl FnTool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            schema,
            handler: Box::new(move |args| handler(args).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String, ToolError> {
        (self.handler)(call.arguments.clone()).await
    }
}

/// Registry for available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the default handler deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        if self.tools.insert(schema.name.clone(), tool).is_some() {
            tracing::warn!(tool = %schema.name, "Tool re-registered, previous handler replaced");
        }
    }

    /// Register a closure handler under a schema
    pub fn register_fn<F, Fut>(&mut self, schema: ToolSchema, handler: F)
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(FnTool::new(schema, handler));
    }

    /// Copy of this registry with one more tool
    #[must_use]
    pub fn extended(&self, tool: Arc<dyn Tool>) -> Self {
        let mut registry = self.clone();
        registry.register_arc(tool);
        registry
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Resolve and run a call, shaping every failure into a [`ToolError`]
    pub async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        tool.schema().validate(call)?;

        let deadline = tool.timeout().unwrap_or(self.timeout);
        let guarded = AssertUnwindSafe(tool.execute(call, ctx)).catch_unwind();

        match tokio::time::timeout(deadline, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                tracing::error!(tool = %call.name, "Tool handler panicked");
                Err(ToolError::Panicked(call.name.clone()))
            }
            Err(_) => Err(ToolError::Timeout {
                tool: call.name.clone(),
                secs: deadline.as_secs(),
            }),
        }
    }

    /// Restrict the registry to the tools one agent may use
    pub fn scope<'a>(&'a self, allowed: &'a BTreeSet<String>) -> ToolScope<'a> {
        ToolScope {
            registry: self,
            allowed,
        }
    }

    /// Get all tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The registry as seen by one agent
pub struct ToolScope<'a> {
    registry: &'a ToolRegistry,
    allowed: &'a BTreeSet<String>,
}

impl ToolScope<'_> {
    /// Descriptors offered to the model: registered and allowed
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry
            .schemas()
            .into_iter()
            .filter(|s| self.allowed.contains(&s.name))
            .collect()
    }

    /// Invoke only if the agent holds the tool; refusals never reach a handler
    pub async fn invoke(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        if !self.allowed.contains(&call.name) {
            return Err(if self.registry.get(&call.name).is_some() {
                ToolError::NotPermitted {
                    tool: call.name.clone(),
                    agent: ctx.agent_id.clone(),
                }
            } else {
                ToolError::NotFound(call.name.clone())
            });
        }
        self.registry.invoke(call, ctx).await
    }
}
