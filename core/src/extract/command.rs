//! Command payloads recovered from a code agent's output

use super::StructuredObject;
use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical side-effect a code agent may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    /// Run a file as a subprocess
    Execute,
    /// Overwrite a file with new content
    Refactor,
}

impl CommandAction {
    const EXECUTE_SYNONYMS: [&'static str; 5] = ["execute", "execution", "exec", "run", "launch"];
    const REFACTOR_SYNONYMS: [&'static str; 6] = ["refactor", "rewrite", "fix", "patch", "edit", "modify"];

    /// Case-insensitive, trimmed synonym lookup. `None` for anything else.
    pub fn normalize(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_lowercase();
        if Self::EXECUTE_SYNONYMS.contains(&wanted.as_str()) {
            Some(CommandAction::Execute)
        } else if Self::REFACTOR_SYNONYMS.contains(&wanted.as_str()) {
            Some(CommandAction::Refactor)
        } else {
            None
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandAction::Execute => f.write_str("execute"),
            CommandAction::Refactor => f.write_str("refactor"),
        }
    }
}

/// `{path, command, content}` requested by the code agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub path: String,
    pub command: CommandAction,
    /// Empty when the model omitted it
    #[serde(default)]
    pub content: String,
}

impl CommandPayload {
    /// Validate a JSON-shaped object. Rejects unknown commands and empty paths.
    pub fn from_object(object: &StructuredObject) -> Result<Self> {
        let raw_command = object
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| RouterError::validation("command field is missing or not a string"))?;

        let command = CommandAction::normalize(raw_command).ok_or_else(|| {
            tracing::warn!(command = raw_command, "rejecting unsupported command");
            RouterError::validation(format!("unsupported command '{}'", raw_command.trim()))
        })?;

        let path = object
            .get("path")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RouterError::validation("path field is missing or empty"))?
            .to_string();

        let content = object
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            path,
            command,
            content,
        })
    }
}
