//! # agent-core
//!
//! Agent orchestration engine: a bounded reasoning loop, tool dispatch,
//! depth-limited specialist delegation and multi-agent routing over a
//! provider-agnostic model gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Orchestrator                            │
//! │   single            supervised               fan-out             │
//! │ ┌───────────┐   ┌──────────────────┐   ┌───────────────────────┐ │
//! │ │ Reasoning │   │    Supervisor    │   │ plan ─▶ JoinSet ─▶    │ │
//! │ │   Loop    │   │ (star, FINISH)   │   │         synthesize    │ │
//! │ └─────┬─────┘   └────────┬─────────┘   └───────────┬───────────┘ │
//! │       │ consult          │ workers                 │ workers     │
//! │       ▼                  ▼                         ▼             │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────────┐  │
//! │  │ Tool        │──│ ModelGateway │  │ SessionStore (optional) │  │
//! │  │ Registry    │  │ (Strategy)   │  └─────────────────────────┘  │
//! │  └─────────────┘  └──────────────┘                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelGateway` trait keeps the engine independent of the model
//! backend; `agent-runtime` provides the Ollama implementation.

pub mod agent;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod mailbox;
pub mod message;
pub mod plan;
pub mod prompt;
pub mod protocol;
pub mod reasoning;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod task_graph;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentConfig, AgentDirectory, Roster};
pub use config::EngineConfig;
pub use delegation::{ConsultTool, CONSULT_TOOL};
pub use engine::{Orchestrator, RunMode, RunRequest, RunResult, RunStatus};
pub use error::{AgentError, Result, ToolError};
pub use gateway::{GenerationOptions, ModelGateway, ModelInfo};
pub use message::{Message, Role};
pub use plan::PlanItem;
pub use prompt::SelectedSource;
pub use reasoning::ReasoningLoop;
pub use session::{MemorySessionStore, SessionId, SessionStore};
pub use state::{ExecutionState, ExecutionStatus};
pub use supervisor::{RouteDecision, Supervisor};
pub use task_graph::{Task, TaskGraph, TaskStatus};
pub use tool::{Arguments, Tool, ToolCall, ToolContext, ToolRegistry, ToolSchema};
