//! Prompt Templates
//!
//! Every prompt the engine sends is assembled here from an agent's
//! configuration and the request's context.

use crate::agent::{AgentConfig, Roster};
use crate::delegation::CONSULT_TOOL;

/// Trailing instruction asking the lead for a `[PLAN]:` checklist
const PLAN_INSTRUCTION: &str = "PROGRESS TRACKING: For every new complex task, start your FIRST response with a section titled `[PLAN]:` followed by a markdown checklist of the high-level steps you intend to take (`- [ ]` open, `- [x]` done).";

/// Document the user explicitly picked for this request
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SelectedSource {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl SelectedSource {
    fn label(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.id)
    }

    /// SQLite table name derived from a spreadsheet filename
    pub fn table_name(&self) -> Option<String> {
        let filename = self.filename.as_deref()?;
        let (stem, ext) = filename.rsplit_once('.')?;
        if !matches!(ext.to_ascii_lowercase().as_str(), "xlsx" | "xls" | "csv") {
            return None;
        }
        Some(
            stem.chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect(),
        )
    }
}

/// Join non-empty sections with blank lines
fn compose<I, S>(sections: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sections
        .into_iter()
        .filter(|s| !s.as_ref().trim().is_empty())
        .map(|s| s.as_ref().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Persona: name, description, instructions and private knowledge
pub fn agent_prompt(agent: &AgentConfig) -> String {
    let header = if agent.description.trim().is_empty() {
        format!("You are {}.", agent.name)
    } else {
        format!("You are {}. {}", agent.name, agent.description.trim())
    };
    let knowledge = agent
        .knowledge
        .as_deref()
        .map(|k| format!("### YOUR KNOWLEDGE:\n{k}"))
        .unwrap_or_default();
    compose([header, agent.instructions.clone(), knowledge])
}

/// "AVAILABLE SPECIALISTS" section naming who `consult` can reach
pub fn specialist_roster(specialists: &Roster) -> String {
    if specialists.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = specialists
        .agents()
        .iter()
        .map(|a| format!("- Name: {} | Role/Desc: {}", a.name, truncate_chars(&a.description, 100)))
        .collect();
    format!(
        "### AVAILABLE SPECIALISTS:\n{}\nUse the `{CONSULT_TOOL}` tool with the EXACT Name above to ask them questions.",
        lines.join("\n")
    )
}

/// Shared document context
pub fn knowledge_section(context: Option<&str>) -> String {
    match context {
        Some(text) if !text.trim().is_empty() => format!(
            "### ADDITIONAL CONTEXT / DOCUMENTS:\nNote: Use the tools to query this data if it refers to structured tables.\n{text}"
        ),
        _ => String::new(),
    }
}

/// Instruction to prioritize one user-selected document
pub fn focus_section(source: Option<&SelectedSource>) -> String {
    let Some(source) = source else {
        return String::new();
    };
    let mut section = format!(
        "### MANDATORY FOCUS SOURCE:\nThe user has explicitly selected ONE document to use for this request: {}\n1. You MUST prioritize information from this source above all others.\n",
        source.label()
    );
    match source.table_name() {
        Some(table) => {
            section.push_str(&format!(
                "2. This is structured data. The TABLE NAME in SQLite is likely: `{table}`. Use this in your SQL queries.\n3. Only search other documents or the internet if the information is explicitly missing from this selected source."
            ));
        }
        None => section.push_str(
            "2. Only search other documents or the internet if the information is explicitly missing from this selected source.",
        ),
    }
    section
}

/// System prompt of a single-mode lead agent
pub fn lead_prompt(
    lead: &AgentConfig,
    specialists: &Roster,
    knowledge: Option<&str>,
    source: Option<&SelectedSource>,
) -> String {
    compose([
        agent_prompt(lead),
        PLAN_INSTRUCTION.to_string(),
        focus_section(source),
        specialist_roster(specialists),
        knowledge_section(knowledge),
    ])
}

/// System prompt of a consulted specialist
pub fn specialist_prompt(specialist: &AgentConfig) -> String {
    compose([
        format!("You are {}, a specialist AI assistant.", specialist.name),
        format!("Description: {}", specialist.description),
        specialist.instructions.clone(),
        "You are being consulted by the lead agent to answer a specific question.\nAnswer concisely and professionally. Focus ONLY on your domain expertise.".to_string(),
        specialist
            .knowledge
            .as_deref()
            .map(|k| format!("### YOUR KNOWLEDGE:\n{k}"))
            .unwrap_or_default(),
    ])
}

/// System prompt of the routing supervisor
pub fn supervisor_prompt(workers: &Roster, knowledge: Option<&str>) -> String {
    let rules = format!(
        "You are a supervisor tasked with managing a conversation between the following workers: {}. Given the following user request, respond with the worker to act next. Each worker will perform a task and respond with their results and status.\nRULES:\n1. You MUST select a worker to act if the user asks a question or gives a task.\n2. Do NOT answer the question yourself.\n3. Do NOT select FINISH unless a worker has already successfully answered the user's question in the history.\n4. If the user asks a generic question, route it to the most relevant worker or pick the first one.\n5. Respond with FINISH only when the conversation is complete.",
        workers.names().join(", ")
    );
    compose([rules, knowledge_section(knowledge)])
}

/// Trailing turn instruction listing the valid choices
pub fn routing_instruction(options: &[String]) -> String {
    format!(
        "Given the conversation above, who should act next? Or should we FINISH? Select one of: {}. Return ONLY the name of the selected option, with no punctuation or explanation.",
        options.join(", ")
    )
}

/// Planning call of a fan-out execution
pub fn planning_prompt(user_message: &str, roster: &Roster) -> String {
    let agents: Vec<String> = roster
        .agents()
        .iter()
        .map(|a| format!("- {}: {}", a.name, a.description))
        .collect();
    format!(
        "You are an AI Project Manager. Analyze this request and create a task breakdown.\n\nUser Request: {user_message}\n\nAvailable Agents:\n{}\n\nCreate a numbered task breakdown with exactly one task per agent.\n\nFormat as:\nTask 1: [Description] - Assigned to: [Agent Name]\nTask 2: [Description] - Assigned to: [Agent Name]",
        agents.join("\n")
    )
}

/// System prompt of one fan-out worker
pub fn worker_prompt(agent: &AgentConfig, knowledge: Option<&str>) -> String {
    let context = knowledge
        .filter(|k| !k.trim().is_empty())
        .map(|k| format!("Context:\n{k}"))
        .unwrap_or_default();
    compose([
        agent_prompt(agent),
        context,
        "Provide your analysis or response.".to_string(),
    ])
}

/// Request handed to a fan-out worker, with the assignments from its mailbox
pub fn worker_request(user_message: &str, assignments: &[String]) -> String {
    if assignments.is_empty() {
        return format!("User Request: {user_message}");
    }
    format!(
        "User Request: {user_message}\n\nYour assignment:\n{}",
        assignments
            .iter()
            .map(|a| format!("- {a}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Synthesis call combining labeled worker outputs
pub fn synthesis_prompt(user_message: &str, sections: &str) -> String {
    format!(
        "You are an AI Project Manager. Synthesize the following agent outputs into a comprehensive response.\n\nUser Request: {user_message}\n\nAgent Outputs:\n{sections}\n\nProvide a clear, comprehensive answer that combines insights from all agents."
    )
}

/// Notice appended when a loop hits its iteration ceiling
pub fn truncation_notice(max_iterations: u32) -> String {
    format!(
        "NOTICE: You have reached the limit of {max_iterations} tool calls for this request. Your reasoning was cut short. No more tools are available: answer now with the information gathered so far, and say what remains unverified."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_prompt_lists_specialists() {
        let lead = AgentConfig::new("pm", "Project Manager").with_instructions("Coordinate the team.");
        let specialists = Roster::new(vec![
            AgentConfig::new("a-2", "Senior Data Analyst").with_description("Excel and SQL"),
        ]);

        let prompt = lead_prompt(&lead, &specialists, Some("Budget: 10k"), None);
        assert!(prompt.starts_with("You are Project Manager."));
        assert!(prompt.contains("- Name: Senior Data Analyst | Role/Desc: Excel and SQL"));
        assert!(prompt.contains("`consult`"));
        assert!(prompt.contains("Budget: 10k"));
        assert!(prompt.contains("[PLAN]:"));
    }

    #[test]
    fn test_lead_prompt_without_specialists_omits_roster() {
        let prompt = lead_prompt(&AgentConfig::new("pm", "PM"), &Roster::default(), None, None);
        assert!(!prompt.contains("AVAILABLE SPECIALISTS"));
        assert!(!prompt.contains("ADDITIONAL CONTEXT"));
    }

    #[test]
    fn test_focus_section_table_hint() {
        let source = SelectedSource {
            id: "src-1".into(),
            filename: Some("Cost Items 2024.xlsx".into()),
        };
        let section = focus_section(Some(&source));
        assert!(section.contains("Cost Items 2024.xlsx"));
        assert!(section.contains("`Cost_Items_2024`"));

        let pdf = SelectedSource {
            id: "src-2".into(),
            filename: Some("contract.pdf".into()),
        };
        assert!(!focus_section(Some(&pdf)).contains("TABLE NAME"));
    }

    #[test]
    fn test_worker_request_includes_assignments() {
        let request = worker_request("compare clauses", &["Review clause 4".into()]);
        assert!(request.ends_with("- Review clause 4"));
        assert_eq!(worker_request("hi", &[]), "User Request: hi");
    }
}
