//! SerpAPI client (`search.json`, any engine)

use super::{SearchApi, SearchParams};
use crate::config::settings::SearchSettings;
use crate::error::{Result, RouterError};
use crate::util::{check_header_safe, sanitize_base_url};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

impl SerpApiClient {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let base_url = sanitize_base_url(&settings.base_url, "search base URL")
            .map_err(|e| RouterError::invalid_config("search.base_url", e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("intent-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RouterError::api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key_env: settings.api_key_env.clone(),
        })
    }

    /// Read at call time so a key exported after startup is still picked up.
    fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RouterError::api(format!("{} is not set", self.api_key_env)))?;
        check_header_safe(&key, &self.api_key_env).map_err(|e| RouterError::api(e.to_string()))?;
        Ok(key)
    }
}

/// Query pairs for the request: `engine`, then every non-null param, then `api_key`.
///
/// Fails when a required param is absent or empty.
pub fn build_query(
    engine: &str,
    params: &SearchParams,
    required: &[&str],
    api_key: &str,
) -> Result<Vec<(String, String)>> {
    let mut query = vec![("engine".to_string(), engine.to_string())];

    for (key, value) in params {
        if key == "engine" || key == "api_key" {
            continue;
        }
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        };
        query.push((key.clone(), rendered));
    }

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| {
            !query
                .iter()
                .any(|(k, v)| k == name && !v.trim().is_empty())
        })
        .collect();
    if !missing.is_empty() {
        return Err(RouterError::api(format!(
            "Missing required parameter(s): {}",
            missing.join(", ")
        )));
    }

    query.push(("api_key".to_string(), api_key.to_string()));
    Ok(query)
}

#[async_trait]
impl SearchApi for SerpApiClient {
    async fn call(&self, engine: &str, params: &SearchParams, required: &[&str]) -> Result<Value> {
        let api_key = self.api_key()?;
        let query = build_query(engine, params, required, &api_key)?;

        tracing::debug!(engine, params = query.len() - 2, "sending search request");

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(engine, "search request failed: {}", e);
                RouterError::api(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        let data: Value = response
            .json()
            .await
            .map_err(|e| RouterError::api(format!("failed to parse search response: {}", e)))?;

        if let Some(message) = data.get("error").and_then(Value::as_str) {
            return Err(RouterError::api(format!("{} ({})", message, status)));
        }
        if !status.is_success() {
            return Err(RouterError::api(format!("search API returned {}", status)));
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> SearchParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn query_merges_engine_params_and_key() {
        let query = build_query(
            "google_finance",
            &params(json!({"q": "TSLA:NASDAQ", "hl": "ko", "window": null, "num": 5})),
            &["q"],
            "secret",
        )
        .unwrap();

        assert_eq!(query[0], ("engine".to_string(), "google_finance".to_string()));
        assert!(query.contains(&("q".to_string(), "TSLA:NASDAQ".to_string())));
        assert!(query.contains(&("num".to_string(), "5".to_string())));
        assert!(!query.iter().any(|(k, _)| k == "window"));
        assert_eq!(query.last().unwrap().0, "api_key");
    }

    #[test]
    fn missing_required_params_are_listed() {
        let err = build_query("google_finance", &params(json!({"q": "  ", "hl": "en"})), &["q", "gl"], "k")
            .unwrap_err();
        assert_eq!(err.kind(), "api");
        assert!(err.to_string().contains("Missing required parameter(s): q, gl"));
    }

    #[test]
    fn params_cannot_override_engine_or_key() {
        let query = build_query(
            "google_news",
            &params(json!({"engine": "google", "api_key": "stolen", "q": "ai"})),
            &[],
            "real",
        )
        .unwrap();
        assert_eq!(query.iter().filter(|(k, _)| k == "engine").count(), 1);
        assert_eq!(query.last().unwrap().1, "real");
    }

    #[tokio::test]
    async fn unset_key_is_an_api_error() {
        let settings = SearchSettings {
            api_key_env: "ROUTER_TEST_SERPAPI_KEY_UNSET".to_string(),
            ..SearchSettings::default()
        };
        let client = SerpApiClient::new(&settings).unwrap();
        let err = client.call("google_news", &SearchParams::new(), &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "api error: ROUTER_TEST_SERPAPI_KEY_UNSET is not set");
    }
}
