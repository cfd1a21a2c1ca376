//! Agent Configuration and Rosters
//!
//! An [`AgentConfig`] is immutable for the duration of an execution. A
//! [`Roster`] is the ordered set of agents taking part in one request; agents
//! are referenced by their index in it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_model() -> String {
    "qwen3:latest".into()
}

/// One agent's persona, model and capabilities
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<String>,
    #[serde(default = "default_model", alias = "model")]
    pub model_id: String,
    #[serde(default, alias = "tools")]
    pub allowed_tools: BTreeSet<String>,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            knowledge: None,
            model_id: default_model(),
            allowed_tools: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    #[must_use]
    pub fn with_knowledge(mut self, knowledge: impl Into<String>) -> Self {
        self.knowledge = Some(knowledge.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_id = model.into();
        self
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.allowed_tools.insert(tool.into());
        self
    }

    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Same agent without one capability
    #[must_use]
    pub fn without_tool(mut self, tool: &str) -> Self {
        self.allowed_tools.remove(tool);
        self
    }

    pub fn may_use(&self, tool: &str) -> bool {
        self.allowed_tools.contains(tool)
    }

    /// Case-insensitive, whitespace-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Lookup boundary for agent configurations
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Find an agent by id, or by name when no id matches
    async fn get(&self, id_or_name: &str) -> Result<Option<AgentConfig>>;

    /// All known agents
    async fn list(&self) -> Result<Vec<AgentConfig>>;
}

/// Ordered agent set for one request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    agents: Vec<AgentConfig>,
}

impl Roster {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self { agents }
    }

    pub fn agents(&self) -> &[AgentConfig] {
        &self.agents
    }

    pub fn agent(&self, index: usize) -> Option<&AgentConfig> {
        self.agents.get(index)
    }

    pub fn first(&self) -> Option<&AgentConfig> {
        self.agents.first()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn index_of_id(&self, id: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    /// Exact case-insensitive name match first, then id
    pub fn resolve(&self, name_or_id: &str) -> Option<(usize, &AgentConfig)> {
        self.agents
            .iter()
            .enumerate()
            .find(|(_, a)| a.is_named(name_or_id))
            .or_else(|| {
                self.agents
                    .iter()
                    .enumerate()
                    .find(|(_, a)| a.id == name_or_id.trim())
            })
    }

    /// Roster without the agent at `index`, order preserved
    #[must_use]
    pub fn without(&self, index: usize) -> Self {
        Self {
            agents: self
                .agents
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, a)| a.clone())
                .collect(),
        }
    }
}

impl FromIterator<AgentConfig> for Roster {
    fn from_iter<T: IntoIterator<Item = AgentConfig>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl AgentDirectory for Roster {
    async fn get(&self, id_or_name: &str) -> Result<Option<AgentConfig>> {
        let by_id = self.agents.iter().find(|a| a.id == id_or_name);
        Ok(by_id
            .or_else(|| self.agents.iter().find(|a| a.is_named(id_or_name)))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<AgentConfig>> {
        Ok(self.agents.clone())
    }
}
