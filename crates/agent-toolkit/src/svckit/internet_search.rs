//! Internet Search Tool
//!
//! Scrapes DuckDuckGo's HTML endpoint, so no API key is needed.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use agent_core::{tool::ParameterSchema, Tool, ToolCall, ToolContext, ToolError, ToolSchema};

use crate::error::{Result, ToolkitError};

pub const INTERNET_SEARCH: &str = "internet_search";

const DEFAULT_ENDPOINT: &str = "https://duckduckgo.com/html/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: usize = 5;

/// One search hit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

/// Tool for web search
pub struct InternetSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl InternetSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.into(),
        }
    }

    /// Point at another DuckDuckGo-compatible HTML endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Extract result titles and links from a results page
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchResult>> {
    let selector = Selector::parse("a.result__a").map_err(|e| ToolkitError::Parse(e.to_string()))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .take(limit)
        .map(|a| SearchResult {
            title: a.text().collect::<String>().trim().to_string(),
            url: a.value().attr("href").unwrap_or_default().to_string(),
        })
        .collect())
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found for the query.".into();
    }
    let lines: Vec<String> = results
        .iter()
        .map(|r| format!("- {}: {}", r.title, r.url))
        .collect();
    format!("Top search results:\n{}", lines.join("\n"))
}

#[async_trait]
impl Tool for InternetSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: INTERNET_SEARCH.into(),
            description: "Search the web and return the titles and URLs of the top results.".into(),
            parameters: vec![ParameterSchema::string("query", "Search terms", true)],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> std::result::Result<String, ToolError> {
        let query = call.require_str("query")?;

        // Html is not Send: parse only after the last await
        let html = self.fetch(query).await.map_err(|e| {
            tracing::error!(agent = %ctx.agent_id, error = %e, "Internet search failed");
            ToolError::execution(ToolkitError::Search(e.to_string()))
        })?;
        let results = parse_results(&html, MAX_RESULTS)?;

        tracing::debug!(agent = %ctx.agent_id, results = results.len(), "Internet search complete");
        Ok(format_results(&results))
    }

    fn timeout(&self) -> Option<Duration> {
        Some(REQUEST_TIMEOUT + Duration::from_secs(5))
    }
}
