//! Google News lookups and freshness filtering

use super::{SearchApi, SearchParams};
use crate::config::settings::NewsSettings;
use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

pub const ENGINE: &str = "google_news";

pub const NO_RECENT_NEWS: &str = "No recent news in the requested window.";

pub async fn fetch_news(api: &dyn SearchApi, params: &SearchParams) -> Result<Value> {
    api.call(ENGINE, params, &[]).await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsItem {
    pub headline: String,
    pub snippet: String,
}

fn days_ago_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+day").expect("valid regex"))
}

/// Items whose relative date (`"2 days ago"`) falls inside `[min_days, max_days]`.
///
/// Anything without a day count (hours, absolute dates) is skipped.
pub fn filter_news(data: &Value, min_days: u32, max_days: u32) -> Vec<NewsItem> {
    let Some(results) = data.get("news_results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|item| {
            let date = item.get("date").and_then(Value::as_str)?.to_lowercase();
            let days: u32 = days_ago_regex().captures(&date)?.get(1)?.as_str().parse().ok()?;
            if !(min_days..=max_days).contains(&days) {
                return None;
            }
            Some(NewsItem {
                headline: text(item, "title"),
                snippet: text(item, "snippet"),
            })
        })
        .collect()
}

fn text(item: &Value, key: &str) -> String {
    item.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn format_news_result(data: &Value, settings: &NewsSettings) -> String {
    let items = filter_news(data, settings.min_days, settings.max_days);
    if items.is_empty() {
        return NO_RECENT_NEWS.to_string();
    }

    items
        .iter()
        .take(settings.limit)
        .enumerate()
        .map(|(i, item)| {
            if item.snippet.is_empty() {
                format!("{}. {}", i + 1, item.headline)
            } else {
                format!("{}. {} - {}", i + 1, item.headline, item.snippet)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
