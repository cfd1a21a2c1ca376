//! Application State

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use agent_core::{AgentConfig, AgentDirectory, MemorySessionStore, Orchestrator, Roster, CONSULT_TOOL};
use agent_toolkit::{
    available_keys, build_knowledge_context, load_knowledge_files, svckit, LEAD_INSTRUCTIONS,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Engine with gateway, tools and session store wired in
    pub engine: Orchestrator,

    /// Agents requests can reference by id or name
    pub directory: Arc<dyn AgentDirectory>,

    /// Persisted traces, readable through the sessions endpoint
    pub sessions: Arc<MemorySessionStore>,

    /// Shared knowledge loaded at startup
    pub knowledge: Option<String>,
}

/// Roster from a JSON file, or the built-in project team
pub fn load_roster(path: Option<&Path>) -> anyhow::Result<Roster> {
    let Some(path) = path else {
        return Ok(default_roster());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading agents file {}", path.display()))?;
    let roster: Roster = serde_json::from_str(&raw)
        .with_context(|| format!("parsing agents file {}", path.display()))?;
    anyhow::ensure!(!roster.is_empty(), "agents file {} lists no agents", path.display());
    Ok(roster)
}

/// Project manager lead with a data analyst specialist
pub fn default_roster() -> Roster {
    Roster::new(vec![
        AgentConfig::new("project-manager", "Project Manager")
            .with_description("Leads the team and owns the final answer")
            .with_instructions(LEAD_INSTRUCTIONS)
            .with_tools([svckit::SEARCH_TEXT_DOCUMENTS, svckit::INTERNET_SEARCH, CONSULT_TOOL]),
        AgentConfig::new("data-analyst", "Senior Data Analyst")
            .with_description("Answers questions from spreadsheet and CSV data using SQL")
            .with_instructions("Inspect the schema before querying. Quote exact figures.")
            .with_tools([svckit::GET_DATA_SCHEMA, svckit::QUERY_DATA]),
    ])
}

/// Knowledge context from every markdown file in `dir`
pub fn load_knowledge(dir: &Path) -> anyhow::Result<Option<String>> {
    let keys = available_keys(dir)?;
    let files = load_knowledge_files(dir, keys.as_slice())?;
    if files.is_empty() {
        return Ok(None);
    }
    tracing::info!(files = files.len(), dir = %dir.display(), "Loaded knowledge files");
    Ok(Some(build_knowledge_context(&files)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_lead_can_consult() {
        let roster = default_roster();
        assert_eq!(roster.len(), 2);
        assert!(roster.first().is_some_and(|lead| lead.may_use(CONSULT_TOOL)));
        assert!(roster.resolve("senior data analyst").is_some());
    }

    #[test]
    fn test_load_roster_from_file() {
        let path = std::env::temp_dir().join(format!("agents-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"id": "pm", "name": "PM", "tools": ["consult"]}, {"id": "legal", "name": "Legal"}]"#,
        )
        .unwrap();

        let roster = load_roster(Some(&path)).unwrap();
        assert_eq!(roster.names(), vec!["PM", "Legal"]);
        std::fs::remove_file(&path).unwrap();

        assert!(load_roster(Some(Path::new("/nonexistent/agents.json"))).is_err());
    }
}
