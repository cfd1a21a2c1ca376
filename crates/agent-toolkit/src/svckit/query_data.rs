//! Structured Data Query Tool
//!
//! Runs SQL against tables loaded from spreadsheets and CSV files.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{tool::ParameterSchema, Tool, ToolCall, ToolContext, ToolError, ToolSchema};

use crate::store::{KnowledgeStore, Row};

pub const QUERY_DATA: &str = "query_data";

const EMPTY_RESULT: &str = "Query executed successfully but returned 0 rows.\n\
SUGGESTION: The data might not match your exact filter.\n\
- Try checking the schema again with `get_data_schema` to verify column names and example values.\n\
- Try a broader query (e.g., using `LIKE` or removing WHERE clauses) to explore the data.\n\
- Check for case sensitivity or extra whitespace in string comparisons.";

/// Tool for querying structured data
pub struct QueryDataTool {
    store: Arc<dyn KnowledgeStore>,
}

impl QueryDataTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

fn format_rows(rows: &[Row]) -> Result<String, ToolError> {
    if rows.is_empty() {
        return Ok(EMPTY_RESULT.into());
    }
    let json = serde_json::to_string_pretty(rows).map_err(ToolError::execution)?;
    Ok(format!("Query Results:\n{json}"))
}

#[async_trait]
impl Tool for QueryDataTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: QUERY_DATA.into(),
            description: "Execute SQL queries against structured data (Excel/CSV files). Use it to \
                analyze spreadsheet data, aggregate, filter, sort or join tables. Example: \
                SELECT product, SUM(quantity) FROM inventory GROUP BY product;"
                .into(),
            parameters: vec![ParameterSchema::string("sql_query", "SQL statement to run", true)],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let sql = call.require_str("sql_query")?;

        let rows = self.store.query(sql).await.inspect_err(|e| {
            tracing::warn!(agent = %ctx.agent_id, sql = %sql, error = %e, "Query failed");
        })?;

        tracing::info!(agent = %ctx.agent_id, sql = %sql, rows = rows.len(), "Executed query");
        format_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKnowledgeStore;
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn call(sql: &str) -> ToolCall {
        ToolCall::new(QUERY_DATA, row(json!({ "sql_query": sql })))
    }

    fn tool() -> QueryDataTool {
        QueryDataTool::new(Arc::new(
            MemoryKnowledgeStore::new()
                .with_table("budget", vec![row(json!({"line": "Design", "amount": 5000}))])
                .with_table("risks", vec![]),
        ))
    }

    #[tokio::test]
    async fn test_rows_rendered_as_json() {
        let output = tool()
            .execute(&call("SELECT * FROM budget"), &ToolContext::new("finance", 0))
            .await
            .unwrap();

        let json = output.strip_prefix("Query Results:\n").unwrap();
        let parsed: Vec<Row> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0]["amount"], 5000);
    }

    #[tokio::test]
    async fn test_empty_result_suggests_schema() {
        let output = tool()
            .execute(&call("SELECT * FROM risks"), &ToolContext::new("finance", 0))
            .await
            .unwrap();
        assert!(output.starts_with("Query executed successfully but returned 0 rows."));
        assert!(output.contains("get_data_schema"));
    }

    #[tokio::test]
    async fn test_failed_query_is_tool_error() {
        let err = tool()
            .execute(&call("DELETE FROM budget"), &ToolContext::new("finance", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));

        let down = QueryDataTool::new(Arc::new(MemoryKnowledgeStore::unavailable("connection refused")));
        let err = down
            .execute(&call("SELECT * FROM budget"), &ToolContext::new("finance", 0))
            .await
            .unwrap_err();
        assert!(err.observation().contains("connection refused"));
    }
}
