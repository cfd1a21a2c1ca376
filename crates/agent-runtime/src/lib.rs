//! # agent-runtime
//!
//! Model gateways for the orchestration engine.
//!
//! ## Gateways
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaGateway;
//!
//! let gateway = Arc::new(OllamaGateway::from_env());
//! let engine = Orchestrator::new(gateway, tools, EngineConfig::from_env()?)?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaGateway};

// Re-export core types for convenience
pub use agent_core::{AgentError, Message, ModelGateway, Result, Role};
