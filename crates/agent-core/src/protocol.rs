//! Text Tool-Call Protocol
//!
//! For models without native function calling. Tools are described in the
//! system prompt and the model answers with a fenced JSON block:
//!
//! ~~~text
//! ```tool
//! {"tool": "query_data", "arguments": {"sql_query": "SELECT 1"}}
//! ```
//! ~~~

use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// System prompt section describing the offered tools; empty when none are offered
pub fn render_tool_section(tools: &[ToolSchema]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
    prompt.push_str("Call one tool at a time and wait for its result. ");
    prompt.push_str("When you can answer, reply in plain text without a tool block.\n\n");

    for schema in tools {
        prompt.push_str(&format!("### {}\n{}\n", schema.name, schema.description));

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                let choices = param
                    .enum_values
                    .as_ref()
                    .map(|v| format!(" One of: {}.", serde_json::Value::Array(v.clone())))
                    .unwrap_or_default();
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}{}\n",
                    param.name, param.param_type, required, param.description, choices
                ));
            }
        }
        prompt.push('\n');
    }

    prompt
}

/// Re-render an assistant tool request the way the model originally wrote it
pub fn render_tool_call(message: &Message) -> String {
    let Some(call) = &message.tool_call else {
        return message.content.clone();
    };
    let block = serde_json::json!({ "tool": call.name, "arguments": call.arguments });
    if message.content.trim().is_empty() {
        format!("{TOOL_FENCE}\n{block}\n{FENCE_END}")
    } else {
        format!("{}\n{TOOL_FENCE}\n{block}\n{FENCE_END}", message.content.trim_end())
    }
}

/// Turn raw model text into an assistant message, extracting a tool request if
/// one of the offered tools was called
pub fn parse_reply(content: &str, offered: &[ToolSchema]) -> Message {
    match parse_tool_call(content) {
        Some((call, prose)) if offered.is_empty() => {
            tracing::debug!(tool = %call.name, "Tool block ignored, no tools were offered");
            Message::assistant(prose)
        }
        Some((call, prose)) => Message::tool_request(prose, call),
        None => Message::assistant(content.trim()),
    }
}

/// Find a tool call; returns it with the surrounding prose
fn parse_tool_call(content: &str) -> Option<(ToolCall, String)> {
    if let Some(start_idx) = content.find(TOOL_FENCE) {
        let after_marker = &content[start_idx + TOOL_FENCE.len()..];
        if let Some(end_idx) = after_marker.find(FENCE_END) {
            let json_str = after_marker[..end_idx].trim();
            if let Some(call) = decode(json_str) {
                let rest = &after_marker[end_idx + FENCE_END.len()..];
                let prose = format!("{}{}", &content[..start_idx], rest);
                return Some((call, prose.trim().to_string()));
            }
        }
    }

    parse_inline_tool_call(content)
}

/// Fallback: a bare JSON object with a "tool" key
fn parse_inline_tool_call(content: &str) -> Option<(ToolCall, String)> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    let call = decode(&content[start..=end])?;
    let prose = format!("{}{}", &content[..start], &content[end + 1..]);
    Some((call, prose.trim().to_string()))
}

fn decode(json_str: &str) -> Option<ToolCall> {
    let mut call = serde_json::from_str::<ToolCall>(json_str).ok()?;
    if call.name.trim().is_empty() {
        return None;
    }
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    Some(call)
}
