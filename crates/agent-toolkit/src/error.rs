//! Error Types for the Toolkit

use agent_core::ToolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Could not parse search results: {0}")]
    Parse(String),

    #[error("Failed to read knowledge file {file}: {reason}")]
    Knowledge { file: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ToolkitError> for ToolError {
    fn from(err: ToolkitError) -> Self {
        ToolError::execution(err)
    }
}
