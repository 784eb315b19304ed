//! OpenAI-compatible chat client
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio and anything else that serves
//! `/chat/completions`. Requests are single-turn with temperature 0.

use super::chat::{ChatRequest, ChatResponse};
use super::{LlmConfig, TextModel};
use crate::error::{Result, RouterError};
use crate::util::{sanitize_base_url, validate_api_key};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client as HttpClient, StatusCode,
};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

pub struct LlmClient {
    config: LlmConfig,
    http_client: HttpClient,
    endpoint: String,
    headers: HeaderMap,
    cancel_token: Option<CancellationToken>,
}

impl LlmClient {
    /// Validates the base URL and API key up front so misconfiguration fails at startup.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base_url = sanitize_base_url(&config.base_url, "LLM base URL")
            .map_err(|e| RouterError::invalid_config("llm.base_url", e.to_string()))?;
        let endpoint = format!("{}/chat/completions", base_url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = config.api_key.as_deref() {
            let key = validate_api_key(api_key, "LLM API key")
                .map_err(|e| RouterError::invalid_config("llm.api_key_env", e.to_string()))?;
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| RouterError::invalid_config("llm.api_key_env", e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("intent-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RouterError::llm(format!("failed to build HTTP client: {}", e)))?;

        Ok(LlmClient {
            config,
            http_client,
            endpoint,
            headers,
            cancel_token: None,
        })
    }

    /// Abort pending retries when the token fires
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    async fn wait(&self, duration: Duration) -> Result<()> {
        match &self.cancel_token {
            Some(token) => tokio::select! {
                _ = sleep(duration) => Ok(()),
                _ = token.cancelled() => Err(RouterError::llm("request cancelled")),
            },
            None => {
                sleep(duration).await;
                Ok(())
            }
        }
    }

    /// Send with jittered exponential backoff, honouring Retry-After on 429.
    ///
    /// Non-retryable statuses are returned as-is for the caller to report.
    async fn send_with_retry(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        let mut delay = INITIAL_BACKOFF;

        loop {
            if self.is_cancelled() {
                return Err(RouterError::llm("request cancelled"));
            }

            let result = self
                .http_client
                .post(&self.endpoint)
                .headers(self.headers.clone())
                .json(request)
                .send()
                .await;

            let wait_for = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || attempt >= max_retries {
                        return Ok(response);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs);
                        let wait = retry_after.unwrap_or(delay);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries,
                            "rate limited (429), waiting {:?}",
                            wait
                        );
                        wait
                    } else if status.is_server_error() {
                        tracing::warn!(%status, attempt = attempt + 1, "provider error, retrying in {:?}", delay);
                        delay
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    if attempt >= max_retries {
                        return Err(RouterError::llm(format!("request to {} failed: {}", self.endpoint, e)));
                    }
                    tracing::warn!(error = %e, attempt = attempt + 1, "network error, retrying in {:?}", delay);
                    delay
                }
            };

            self.wait(wait_for).await?;
            attempt += 1;

            // Double, then jitter by +/- 500ms
            let jitter_ms = rand::thread_rng().gen_range(-500i64..=500);
            let next_ms = (delay.as_millis() as i64 * 2 + jitter_ms).max(0) as u64;
            delay = Duration::from_millis(next_ms);
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.send_with_retry(request).await?;

        match response.status() {
            StatusCode::OK => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| RouterError::llm(format!("failed to read response body: {}", e)))?;
                serde_json::from_str::<ChatResponse>(&text).map_err(|e| {
                    tracing::error!("unparseable chat response: {}. Raw body: {}", e, text);
                    RouterError::llm(format!("failed to parse chat response: {}", e))
                })
            }
            StatusCode::UNAUTHORIZED => Err(RouterError::llm("authentication failed, check the API key")),
            StatusCode::TOO_MANY_REQUESTS => Err(RouterError::llm("rate limit exceeded after retries")),
            status => {
                let error_body: Option<serde_json::Value> = response.json().await.ok();
                let message = error_body
                    .as_ref()
                    .and_then(|v| v.get("error"))
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                Err(RouterError::llm(format!("API request failed ({}): {}", status, message)))
            }
        }
    }
}

#[async_trait]
impl TextModel for LlmClient {
    async fn generate(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest::single_turn(&self.config.model, system, user, max_tokens);
        let response = self.chat(&request).await?;

        if let Some(usage) = response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "generation finished"
            );
        }
        if response.choices.first().and_then(|c| c.finish_reason.as_deref()) == Some("length") {
            tracing::debug!(max_tokens, "generation hit the token limit");
        }

        Ok(response.content().to_string())
    }
}
