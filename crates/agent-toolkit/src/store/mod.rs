//! Knowledge Store Integration
//!
//! The vector index and relational store behind the tools are external
//! services. Tools reach them only through [`KnowledgeStore`].

mod memory;

pub use memory::MemoryKnowledgeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// One result row, column name to value
pub type Row = Map<String, Value>;

/// A matching chunk of a text document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub content: String,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Structured table loaded from a spreadsheet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    /// A few rows to show example values
    #[serde(default)]
    pub sample: Vec<Row>,
}

/// Store trait (Strategy pattern)
///
/// Implement this for each backend: pgvector + SQLite, a hosted index, etc.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Semantic search over text documents, optionally within one file
    async fn search_documents(
        &self,
        query: &str,
        target_filename: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DocumentHit>>;

    /// Run SQL against the structured tables
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Describe the structured tables
    async fn schema(&self) -> Result<Vec<TableSchema>>;

    /// Store name
    fn name(&self) -> &str;
}
