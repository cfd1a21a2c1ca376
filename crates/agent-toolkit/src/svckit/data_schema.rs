//! Data Schema Tool
//!
//! Lists structured tables so the model can write valid SQL.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Tool, ToolCall, ToolContext, ToolError, ToolSchema};

use crate::store::{KnowledgeStore, TableSchema};

pub const GET_DATA_SCHEMA: &str = "get_data_schema";

/// Tool describing the loaded tables
pub struct DataSchemaTool {
    store: Arc<dyn KnowledgeStore>,
}

impl DataSchemaTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

fn describe(tables: &[TableSchema]) -> String {
    if tables.is_empty() {
        return "No structured data tables are currently loaded.".into();
    }

    tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            let mut section = format!(
                "Table: {} ({} rows)\nColumns: {columns}",
                table.name, table.row_count
            );
            if !table.sample.is_empty() {
                section.push_str("\nExample rows:");
                for row in &table.sample {
                    let _ = write!(section, "\n  {}", serde_json::Value::Object(row.clone()));
                }
            }
            section
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for DataSchemaTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: GET_DATA_SCHEMA.into(),
            description: "Get the available structured data tables (from Excel/CSV files) with \
                columns, row counts and data types. Use this before writing SQL queries."
                .into(),
            parameters: vec![],
        }
    }

    async fn execute(&self, _call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let tables = self.store.schema().await?;
        tracing::debug!(agent = %ctx.agent_id, tables = tables.len(), "Schema requested");
        Ok(describe(&tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKnowledgeStore;
    use agent_core::Arguments;
    use serde_json::json;

    async fn run(store: MemoryKnowledgeStore) -> Result<String, ToolError> {
        DataSchemaTool::new(Arc::new(store))
            .execute(&ToolCall::new(GET_DATA_SCHEMA, Arguments::new()), &ToolContext::new("pm", 0))
            .await
    }

    #[tokio::test]
    async fn test_describes_tables() {
        let rows = vec![json!({"task": "Kickoff", "hours": 4}).as_object().cloned().unwrap()];
        let output = run(MemoryKnowledgeStore::new().with_table("timeline", rows)).await.unwrap();

        assert!(output.starts_with("Table: timeline (1 rows)"));
        assert!(output.contains("hours (INTEGER)"));
        assert!(output.contains("task (TEXT)"));
        assert!(output.contains("Kickoff"));
    }

    #[tokio::test]
    async fn test_no_tables_and_outage() {
        assert_eq!(
            run(MemoryKnowledgeStore::new()).await.unwrap(),
            "No structured data tables are currently loaded."
        );
        assert!(run(MemoryKnowledgeStore::unavailable("db locked")).await.is_err());
    }
}
