//! # agent-toolkit
//!
//! Domain tools for the orchestration engine: document search, structured
//! data queries, schema discovery and web search.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_toolkit::{register_tools, MemoryKnowledgeStore};
//!
//! let mut registry = ToolRegistry::new();
//! register_tools(&mut registry, Arc::new(MemoryKnowledgeStore::new()), reqwest::Client::new());
//! ```

pub mod error;
pub mod knowledge_files;
pub mod store;
pub mod svckit;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{Result, ToolkitError};
pub use knowledge_files::{available_keys, build_knowledge_context, load_knowledge_files};
pub use store::{KnowledgeStore, MemoryKnowledgeStore};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{DataSchemaTool, InternetSearchTool, QueryDataTool, SearchDocumentsTool};
}

/// Names of every tool registered by [`register_tools`]
pub const TOOL_NAMES: [&str; 4] = [
    svckit::SEARCH_TEXT_DOCUMENTS,
    svckit::QUERY_DATA,
    svckit::GET_DATA_SCHEMA,
    svckit::INTERNET_SEARCH,
];

/// Register the standard tool set
pub fn register_tools(registry: &mut ToolRegistry, store: Arc<dyn KnowledgeStore>, client: reqwest::Client) {
    registry.register(tools::SearchDocumentsTool::new(store.clone()));
    registry.register(tools::QueryDataTool::new(store.clone()));
    registry.register(tools::DataSchemaTool::new(store));
    registry.register(tools::InternetSearchTool::new(client));
}

/// Instructions for the lead project-management agent
pub const LEAD_INSTRUCTIONS: &str = r"You are an AI Project Manager leading a team of specialist agents. Fulfil the user's project management request completely.

## Operating Rules

1. Think step by step before acting.
2. Delegate data extraction. For purchase orders, cost items or exact figures, consult the data specialist with the `consult` tool instead of querying yourself.
3. Check more than one source. When documents mention something quantitative, verify it against the structured data.
4. If a search comes back empty, try another angle, tool or specialist before giving up.
5. Keep going after every tool result until you can give the final answer. Do not ask for permission to continue.
6. Never invent processes, templates or data.
7. Answer in a professional project-management style: executive summary, bullet points, tables.";
