//! Configuration
//!
//! Everything lives in one directory:
//!
//! - `prompts.yaml` (required): system prompts keyed by stage
//! - `routing_rules.yaml` (required): the ordered keyword rule table
//! - `router.toml` (optional): endpoints, token budgets, executor limits
//!
//! Loading is all-or-nothing and happens once at startup. After that every
//! piece is read-only.

pub mod prompts;
pub mod rules;
pub mod settings;

pub use prompts::PromptStore;
pub use rules::{IntentRule, KeywordRuleTable};
pub use settings::Settings;

use crate::error::Result;
use std::path::{Path, PathBuf};

pub const PROMPTS_FILE: &str = "prompts.yaml";
pub const RULES_FILE: &str = "routing_rules.yaml";
pub const SETTINGS_FILE: &str = "router.toml";

/// Env var naming the configuration directory
pub const CONFIG_DIR_ENV: &str = "ROUTER_CONFIG_DIR";

/// Pick the configuration directory.
///
/// Order: explicit path, `ROUTER_CONFIG_DIR`, `./config` when present, then
/// the platform config dir (`~/.config/intent-router` on Linux).
pub fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    let local = PathBuf::from("config");
    if local.is_dir() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("intent-router"))
        .unwrap_or(local)
}

/// Fully loaded configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub dir: PathBuf,
    pub settings: Settings,
    pub prompts: PromptStore,
    pub rules: KeywordRuleTable,
}

impl RouterConfig {
    pub fn load(dir: &Path) -> Result<Self> {
        let settings = Settings::load_or_default(&dir.join(SETTINGS_FILE))?;
        let prompts = PromptStore::load(&dir.join(PROMPTS_FILE))?;
        let rules = KeywordRuleTable::load(&dir.join(RULES_FILE))?;

        if rules.is_empty() {
            tracing::warn!("rule table is empty; confident sources will always use their default intent");
        }
        tracing::debug!(dir = %dir.display(), prompts = prompts.keys().len(), "configuration loaded");

        Ok(Self {
            dir: dir.to_path_buf(),
            settings,
            prompts,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPTS: &str = "source_router: {system: a}\nstock_api: {system: b}\nnews_api: {system: c}\ncode: {system: d}\nsupervisor: {system: e}\n";

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve_config_dir(Some(Path::new("/tmp/router-conf")));
        assert_eq!(dir, PathBuf::from("/tmp/router-conf"));
    }

    #[test]
    fn loads_complete_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROMPTS_FILE), PROMPTS).unwrap();
        std::fs::write(dir.path().join(RULES_FILE), "web:\n  fetch_stocks: [주가]\n").unwrap();

        let config = RouterConfig::load(dir.path()).unwrap();
        assert_eq!(config.settings.generation.max_tokens, 512);
        assert_eq!(config.prompts.get(prompts::CODE).unwrap(), "d");
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn missing_rules_abort_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROMPTS_FILE), PROMPTS).unwrap();
        let err = RouterConfig::load(dir.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(RULES_FILE));
    }
}
