//! Prompt store
//!
//! Loads `prompts.yaml`, a mapping of `key -> { system: <prompt> }`.
//! Every key the pipeline asks for must be present and non-empty, otherwise
//! loading fails and the process does not start.

use crate::error::{OptionExt, Result, RouterError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Prompt keys the pipeline reads
pub const SOURCE_ROUTER: &str = "source_router";
pub const STOCK_API: &str = "stock_api";
pub const NEWS_API: &str = "news_api";
pub const CODE: &str = "code";
pub const SUPERVISOR: &str = "supervisor";

pub const REQUIRED_KEYS: [&str; 5] = [SOURCE_ROUTER, STOCK_API, NEWS_API, CODE, SUPERVISOR];

#[derive(Debug, Deserialize)]
struct PromptEntry {
    #[serde(default)]
    system: String,
}

/// Read-only system prompts keyed by stage
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    prompts: HashMap<String, String>,
}

impl PromptStore {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RouterError::MissingConfig {
                key: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            RouterError::Yaml(err) => RouterError::invalid_config(path, err.to_string()),
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let entries: Option<HashMap<String, PromptEntry>> = serde_yml::from_str(content)?;
        let prompts = entries
            .unwrap_or_default()
            .into_iter()
            .map(|(key, entry)| (key, entry.system))
            .collect();

        let store = Self { prompts };
        store.ensure_required()?;
        Ok(store)
    }

    /// Build a store from in-memory pairs; the required keys are still enforced.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prompts = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let store = Self { prompts };
        store.ensure_required()?;
        Ok(store)
    }

    fn ensure_required(&self) -> Result<()> {
        for key in REQUIRED_KEYS {
            self.get(key)?;
        }
        Ok(())
    }

    /// System prompt for a key; empty prompts count as missing.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.prompts
            .get(key)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or_missing(format!("prompts.{}.system", key))
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.prompts.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
