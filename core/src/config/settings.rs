//! Runtime settings (`router.toml`)
//!
//! Every field has a default, so the file is optional. A present but
//! malformed file is a startup error.

use crate::error::{Result, RouterError};
use crate::extract::DEFAULT_TURN_MARKERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub generation: GenerationSettings,
    pub search: SearchSettings,
    pub news: NewsSettings,
    pub executor: ExecutorSettings,
    pub extraction: ExtractionSettings,
}

/// Text model endpoint (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key; unset means no auth header
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.2:3b-instruct-fp16".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Classifier, parameter extraction and supervisor
    pub max_tokens: u32,
    /// Code agent output carries file contents
    pub code_max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            code_max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://serpapi.com/search.json".to_string(),
            api_key_env: "SERPAPI_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// News freshness window, in days
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub min_days: u32,
    pub max_days: u32,
    pub limit: usize,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            min_days: 1,
            max_days: 3,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Every path the code agent touches must resolve inside this directory
    pub workspace: PathBuf,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            timeout_secs: 30,
            max_output_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub turn_markers: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            turn_markers: DEFAULT_TURN_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Load from file if it exists, otherwise defaults. Env overrides apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Settings>(&content)
                .map_err(|e| RouterError::invalid_config(path, e.to_string()))?
        } else {
            tracing::debug!("{} not found, using default settings", path.display());
            Settings::default()
        };
        settings.apply_env_overrides();
        settings.validate(path)?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ROUTER_LLM_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("ROUTER_LLM_MODEL") {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.news.min_days > self.news.max_days {
            return Err(RouterError::invalid_config(
                path,
                format!(
                    "news.min_days ({}) is greater than news.max_days ({})",
                    self.news.min_days, self.news.max_days
                ),
            ));
        }
        if self.executor.timeout_secs == 0 {
            return Err(RouterError::invalid_config(path, "executor.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// API key for the text model, if the configured variable is set
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("router.toml")).unwrap();
        assert_eq!(settings.generation.max_tokens, 512);
        assert_eq!(settings.news.max_days, 3);
        assert_eq!(settings.extraction.turn_markers.len(), 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "[executor]\ntimeout_secs = 5\n\n[news]\nlimit = 2\n").unwrap();
        let settings = Settings::load_or_default(&path).unwrap();
        assert_eq!(settings.executor.timeout_secs, 5);
        assert_eq!(settings.executor.max_output_bytes, 100_000);
        assert_eq!(settings.news.limit, 2);
        assert_eq!(settings.search.api_key_env, "SERPAPI_KEY");
    }

    #[test]
    fn inverted_news_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "[news]\nmin_days = 4\nmax_days = 2\n").unwrap();
        let err = Settings::load_or_default(&path).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "[executor\n").unwrap();
        assert!(Settings::load_or_default(&path).unwrap_err().is_fatal());
    }
}
