//! Knowledge Files
//!
//! Markdown files (skills, processes, templates) loaded from a directory and
//! concatenated into the knowledge context handed to agents.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ToolkitError};

/// Read `<key>.md` for each key; missing files are skipped
pub fn load_knowledge_files<S: AsRef<str>>(dir: &Path, keys: &[S]) -> Result<BTreeMap<String, String>> {
    let mut loaded = BTreeMap::new();

    for key in keys {
        let key = key.as_ref();
        let filename = format!("{key}.md");
        let path = dir.join(&filename);
        if !path.is_file() {
            tracing::debug!(file = %path.display(), "Knowledge file not found, skipping");
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ToolkitError::Knowledge {
            file: filename,
            reason: e.to_string(),
        })?;
        loaded.insert(key.to_string(), content);
    }

    Ok(loaded)
}

/// Keys of every markdown file in `dir`, sorted
pub fn available_keys(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ToolkitError::Knowledge {
        file: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut keys: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    keys.sort();
    Ok(keys)
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// One `## Key` section per file
pub fn build_knowledge_context(knowledge: &BTreeMap<String, String>) -> String {
    knowledge
        .iter()
        .map(|(key, content)| format!("## {}\n{content}\n", capitalize(key)))
        .collect::<Vec<_>>()
        .join("\n")
}
