//! Service Kit - Agent Tools
//!
//! Domain tools that implement `agent_core::Tool`. Store and network faults
//! are returned as `ToolError` so the reasoning loop can observe them.

mod data_schema;
mod internet_search;
mod query_data;
mod search_documents;

pub use data_schema::{DataSchemaTool, GET_DATA_SCHEMA};
pub use internet_search::{InternetSearchTool, INTERNET_SEARCH};
pub use query_data::{QueryDataTool, QUERY_DATA};
pub use search_documents::{SearchDocumentsTool, SEARCH_TEXT_DOCUMENTS};
