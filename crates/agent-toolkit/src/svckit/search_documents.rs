//! Text Document Search Tool
//!
//! Semantic search over uploaded PDFs and Word documents.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{tool::ParameterSchema, Tool, ToolCall, ToolContext, ToolError, ToolSchema};

use crate::store::{DocumentHit, KnowledgeStore};

pub const SEARCH_TEXT_DOCUMENTS: &str = "search_text_documents";

const MATCH_COUNT: usize = 5;

/// Tool for searching text documents in the knowledge store
pub struct SearchDocumentsTool {
    store: Arc<dyn KnowledgeStore>,
}

impl SearchDocumentsTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

fn format_hits(hits: &[DocumentHit]) -> String {
    if hits.is_empty() {
        return "No relevant text documents found.".into();
    }

    let mut output = String::from("Found the following relevant information:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(output, "{}. {}\n   Source: {}\n\n", i + 1, hit.content, hit.source);
    }
    output
}

#[async_trait]
impl Tool for SearchDocumentsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_TEXT_DOCUMENTS.into(),
            description: "Search through text documents (PDFs, Word docs) using semantic search. \
                If 'target_filename' is provided, only that file is searched. Use it when the \
                user has selected a specific source."
                .into(),
            parameters: vec![
                ParameterSchema::string("query", "What to look for", true),
                ParameterSchema::string("target_filename", "Restrict the search to this file", false),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let query = call.require_str("query")?;
        let target = call.str_arg("target_filename").filter(|f| !f.is_empty());

        let hits = self
            .store
            .search_documents(query, target, MATCH_COUNT)
            .await
            .inspect_err(|e| tracing::warn!(agent = %ctx.agent_id, error = %e, "Document search failed"))?;

        tracing::debug!(agent = %ctx.agent_id, hits = hits.len(), "Document search complete");
        Ok(format_hits(&hits))
    }
}
