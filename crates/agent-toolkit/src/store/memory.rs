//! In-memory Knowledge Store
//!
//! For development and tests. Documents are ranked by query-term overlap;
//! SQL support is limited to `SELECT * FROM <table> [LIMIT n]` plus canned
//! results registered per query.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{ColumnInfo, DocumentHit, KnowledgeStore, Row, TableSchema};
use crate::error::{Result, ToolkitError};

const SAMPLE_ROWS: usize = 3;

/// In-memory store with optional simulated outage
#[derive(Default)]
pub struct MemoryKnowledgeStore {
    documents: Vec<DocumentHit>,
    tables: Vec<(String, Vec<Row>)>,
    canned: HashMap<String, Vec<Row>>,
    outage: Option<String>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every call fails, as if the backend were down
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            outage: Some(reason.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_document(mut self, source: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents.push(DocumentHit {
            content: content.into(),
            source: source.into(),
        });
        self
    }

    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.push((name.into(), rows));
        self
    }

    /// Fixed result for one exact query
    #[must_use]
    pub fn with_query_result(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.canned.insert(normalize(sql), rows);
        self
    }

    fn check_available(&self) -> Result<()> {
        match &self.outage {
            Some(reason) => Err(ToolkitError::StoreUnavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> Option<&[Row]> {
        self.tables
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, rows)| rows.as_slice())
    }

    /// `SELECT * FROM table [LIMIT n]`
    fn select_all(&self, sql: &str) -> Option<Result<Vec<Row>>> {
        let tokens: Vec<&str> = sql.split_whitespace().collect();
        let [select, star, from, table, rest @ ..] = tokens.as_slice() else {
            return None;
        };
        if !select.eq_ignore_ascii_case("select") || *star != "*" || !from.eq_ignore_ascii_case("from") {
            return None;
        }

        let limit = match rest {
            [] => None,
            [kw, n] if kw.eq_ignore_ascii_case("limit") => Some(n.parse::<usize>().ok()?),
            _ => return None,
        };

        let table = table.trim_matches(|c: char| c == '`' || c == '"');
        Some(match self.table(table) {
            Some(rows) => Ok(rows.iter().take(limit.unwrap_or(usize::MAX)).cloned().collect()),
            None => Err(ToolkitError::Query(format!("no such table: {table}"))),
        })
    }
}

fn normalize(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(n) if n.is_f64() => "REAL",
        Value::Number(_) => "INTEGER",
        Value::String(_) => "TEXT",
        Value::Array(_) | Value::Object(_) => "JSON",
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn search_documents(
        &self,
        query: &str,
        target_filename: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DocumentHit>> {
        self.check_available()?;

        let terms: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|t| t.len() > 2)
            .collect();

        let mut scored: Vec<(usize, &DocumentHit)> = self
            .documents
            .iter()
            .filter(|doc| target_filename.is_none_or(|f| doc.source == f))
            .map(|doc| {
                let content = doc.content.to_lowercase();
                (terms.iter().filter(|t| content.contains(t.as_str())).count(), doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, doc)| doc.clone()).collect())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.check_available()?;

        if let Some(rows) = self.canned.get(&normalize(sql)) {
            return Ok(rows.clone());
        }
        let trimmed = sql.trim().trim_end_matches(';');
        self.select_all(trimmed).unwrap_or_else(|| {
            Err(ToolkitError::Query(format!(
                "unsupported statement for the in-memory store: {trimmed}"
            )))
        })
    }

    async fn schema(&self) -> Result<Vec<TableSchema>> {
        self.check_available()?;

        Ok(self
            .tables
            .iter()
            .map(|(name, rows)| TableSchema {
                name: name.clone(),
                columns: rows
                    .first()
                    .map(|row| {
                        row.iter()
                            .map(|(column, value)| ColumnInfo {
                                name: column.clone(),
                                data_type: type_name(value).into(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                row_count: rows.len(),
                sample: rows.iter().take(SAMPLE_ROWS).cloned().collect(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Memory"
    }
}
