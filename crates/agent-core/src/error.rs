//! Error Types
//!
//! Two classes of failure flow through the engine. [`AgentError`] is fatal to
//! the loop that raised it and surfaces as an `error` run result. [`ToolError`]
//! is recoverable: it is rendered into a textual observation and handed back
//! to the model.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Marker every failed observation starts with
pub const ERROR_MARKER: &str = "Error: ";

/// Engine error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model substrate timed out or could not be reached
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Model answered, but with something the gateway could not use
    #[error("Model error: {0}")]
    Model(String),

    /// Agent could not be resolved from the roster
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Request cannot be executed as given (empty roster, bad mode...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Parse error (e.g., tool call parsing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Persistence collaborator failed
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A concurrent branch panicked or was cancelled
    #[error("Internal fault: {0}")]
    Internal(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::ModelUnavailable(_) | AgentError::Io(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::ModelUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::Model(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::AgentNotFound(name) => format!("The agent '{name}' is not available."),
            AgentError::InvalidRequest(msg) => format!("Invalid request: {msg}"),
            AgentError::Session(_) => "The conversation could not be loaded or saved.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

/// Recoverable tool failures, turned into observations by the reasoning loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Tool name is not registered
    #[error("Tool '{0}' is not registered.")]
    NotFound(String),

    /// Tool exists but the active agent may not use it
    #[error("Tool '{tool}' is not permitted for agent '{agent}'.")]
    NotPermitted { tool: String, agent: String },

    /// Arguments did not satisfy the tool schema
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Handler reported a failure (network, malformed query, missing resource...)
    #[error("{0}")]
    Execution(String),

    /// Handler did not finish before its deadline
    #[error("Tool '{tool}' timed out after {secs}s.")]
    Timeout { tool: String, secs: u64 },

    /// Handler panicked
    #[error("Tool '{0}' failed unexpectedly.")]
    Panicked(String),

    /// `consult` named nobody in the roster
    #[error("Specialist '{0}' not found. Please verify the agent name.")]
    SpecialistNotFound(String),

    /// `consult` would nest deeper than allowed
    #[error(
        "Delegation refused: consulting another specialist would reach depth {requested}, the maximum is {max}. Answer with the information you already have."
    )]
    DelegationDepthExceeded { requested: u32, max: u32 },

    /// Child loop ended in a fatal error
    #[error("Specialist '{specialist}' could not answer: {reason}")]
    DelegationFailed { specialist: String, reason: String },
}

impl ToolError {
    /// Wrap any displayable handler fault
    pub fn execution(err: impl std::fmt::Display) -> Self {
        ToolError::Execution(err.to_string())
    }

    /// Textual observation for the reasoning loop, always prefixed with [`ERROR_MARKER`]
    pub fn observation(&self) -> String {
        format!("{ERROR_MARKER}{self}")
    }
}
