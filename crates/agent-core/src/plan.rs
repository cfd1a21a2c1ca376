//! `[PLAN]:` checklist extraction
//!
//! Lead agents open complex answers with a markdown checklist:
//!
//! ```text
//! [PLAN]:
//! - [x] Read the contract
//! - [ ] Compare clauses
//! ```

use serde::{Deserialize, Serialize};

const PLAN_MARKER: &str = "[PLAN]:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub text: String,
    pub completed: bool,
}

/// Checklist items of the first `[PLAN]:` section, empty if there is none
pub fn parse_plan(answer: &str) -> Vec<PlanItem> {
    let Some(start) = answer.find(PLAN_MARKER) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut seen_item = false;
    for line in answer[start + PLAN_MARKER.len()..].lines() {
        let line = line.trim();
        if let Some(text) = line.strip_prefix("- [ ]") {
            items.push(PlanItem { text: text.trim().to_string(), completed: false });
            seen_item = true;
        } else if let Some(text) = line.strip_prefix("- [x]").or_else(|| line.strip_prefix("- [X]")) {
            items.push(PlanItem { text: text.trim().to_string(), completed: true });
            seen_item = true;
        } else if seen_item {
            break;
        }
    }
    items
}
