//! Text model access
//!
//! Every pipeline stage talks to the model through [`TextModel`]: a system
//! prompt, a user message and a token budget in, generated text out.
//! [`LlmClient`] is the production implementation over an
//! OpenAI-compatible chat endpoint; tests inject their own.

pub mod chat;
pub mod client;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, MessageRole};
pub use client::LlmClient;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;

/// Deterministic text generation
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;
}

/// Endpoint configuration for [`LlmClient`]
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Retries after the first attempt, for 429, 5xx and network errors
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        LlmConfig {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        LlmConfig {
            base_url: settings.llm.base_url.clone(),
            model: settings.llm.model.clone(),
            api_key: settings.llm_api_key(),
            timeout_secs: settings.llm.timeout_secs,
            max_retries: settings.llm.max_retries,
        }
    }
}
