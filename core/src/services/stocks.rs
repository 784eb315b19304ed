//! Google Finance lookups

use super::{SearchApi, SearchParams};
use crate::error::Result;
use serde_json::Value;

pub const ENGINE: &str = "google_finance";
pub const REQUIRED: &[&str] = &["q"];

const MARKET_ENTRIES: usize = 5;

pub async fn fetch_stocks(api: &dyn SearchApi, params: &SearchParams) -> Result<Value> {
    api.call(ENGINE, params, REQUIRED).await
}

/// Text at `path`, or `N/A` when missing or not a scalar.
fn field(value: &Value, path: &[&str]) -> String {
    field_or(value, path, "N/A")
}

fn field_or(value: &Value, path: &[&str], default: &str) -> String {
    let found = path.iter().try_fold(value, |v, key| v.get(*key));
    match found {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Multi-line summary: the date, the leading US market entries, then the
/// requested ticker with regular and extended-hours figures.
pub fn format_stock_result(data: &Value) -> String {
    let summary = data.get("summary").unwrap_or(&Value::Null);
    let trading = field_or(summary, &["market", "trading"], "After Hours");

    let mut lines = vec![format!("TODAY: {}", field(summary, &["date"])), String::new()];

    let us = data
        .pointer("/markets/us")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in us.iter().take(MARKET_ENTRIES) {
        lines.push(format!("NAME: {}", field(item, &["name"])));
        lines.push(format!("PRICE: ${}", field(item, &["price"])));
        lines.push(String::new());
    }

    lines.push("<<< REQUESTED TICKER >>>".to_string());
    lines.push(format!("TITLE: {}", field(summary, &["title"])));
    lines.push(format!("STOCK: {}", field(summary, &["stock"])));
    lines.push(format!("EXCHANGE: {}", field(summary, &["exchange"])));
    lines.push(format!(
        "PRICE: {}  ({}) -> {}",
        field(summary, &["price"]),
        trading,
        field(summary, &["market", "price"])
    ));
    lines.push(format!(
        "PERCENTAGE: {} {} ({}) -> {} {}",
        field(summary, &["price_movement", "percentage"]),
        field(summary, &["price_movement", "movement"]),
        trading,
        field(summary, &["market", "price_movement", "percentage"]),
        field(summary, &["market", "price_movement", "movement"])
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_response_is_formatted() {
        let data = json!({
            "summary": {
                "date": "Oct 15, 2026",
                "title": "Tesla Inc",
                "stock": "TSLA",
                "exchange": "NASDAQ",
                "price": "$251.30",
                "price_movement": {"percentage": 1.2, "movement": "Up"},
                "market": {
                    "trading": "Pre-market",
                    "price": "$253.00",
                    "price_movement": {"percentage": 0.7, "movement": "Up"}
                }
            },
            "markets": {"us": [
                {"name": "Dow Jones", "price": 42000.5},
                {"name": "S&P 500", "price": "5,800.1"}
            ]}
        });

        let text = format_stock_result(&data);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TODAY: Oct 15, 2026");
        assert_eq!(lines[2], "NAME: Dow Jones");
        assert_eq!(lines[3], "PRICE: $42000.5");
        assert!(text.contains("STOCK: TSLA"));
        assert!(text.contains("PRICE: $251.30  (Pre-market) -> $253.00"));
        assert!(text.contains("PERCENTAGE: 1.2 Up (Pre-market) -> 0.7 Up"));
    }

    #[test]
    fn missing_fields_render_na() {
        let text = format_stock_result(&json!({}));
        assert!(text.starts_with("TODAY: N/A"));
        assert!(!text.contains("NAME:"));
        assert!(text.contains("PRICE: N/A  (After Hours) -> N/A"));
        assert!(text.contains("PERCENTAGE: N/A N/A (After Hours) -> N/A N/A"));
    }

    #[test]
    fn only_first_five_markets_are_listed() {
        let us: Vec<Value> = (0..8).map(|i| json!({"name": format!("M{i}"), "price": i})).collect();
        let text = format_stock_result(&json!({"markets": {"us": us}}));
        assert_eq!(text.matches("NAME:").count(), 5);
        assert!(text.contains("NAME: M4"));
        assert!(!text.contains("NAME: M5"));
    }
}
