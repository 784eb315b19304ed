//! Keyword rule table
//!
//! `routing_rules.yaml` maps each source to an ORDERED list of intents and
//! their keywords. Order is part of the schema: the first intent with a
//! matching keyword wins. Two shapes are accepted per source:
//!
//! ```yaml
//! web:
//!   - intent: fetch_stocks
//!     keywords: [주가, stock]
//!   - intent: fetch_news
//!     keywords: [뉴스, news]
//! code:
//!   review_code: [review, 리뷰]
//!   refactor_code: [refactor]
//! ```
//!
//! In the mapping shape the document order is the iteration order.

use crate::error::{Result, RouterError};
use crate::routing::{Intent, Source};
use serde_yml::Value;
use std::collections::HashMap;
use std::path::Path;

/// One intent and the keywords that select it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRule {
    pub intent: Intent,
    /// Lowercased, trimmed, never empty
    pub keywords: Vec<String>,
}

impl IntentRule {
    pub fn new<I, S>(intent: Intent, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { intent, keywords }
    }

    /// Case-insensitive substring test against already-lowercased text
    pub fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|kw| text_lower.contains(kw.as_str()))
    }
}

/// Read-only after load
#[derive(Debug, Clone, Default)]
pub struct KeywordRuleTable {
    rules: HashMap<Source, Vec<IntentRule>>,
}

impl KeywordRuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and embedders
    pub fn with_rules(mut self, source: Source, rules: Vec<IntentRule>) -> Self {
        self.rules.insert(source, rules);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RouterError::MissingConfig {
                key: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_yml::from_str(&content)
            .map_err(|e| RouterError::invalid_config(path, e.to_string()))?;
        Self::from_value(&value).map_err(|msg| RouterError::invalid_config(path, msg))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_yml::from_str(content)?;
        Self::from_value(&value).map_err(|msg| RouterError::invalid_config("routing_rules.yaml", msg))
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let mut table = Self::new();
        let root = match value {
            Value::Null => return Ok(table),
            Value::Mapping(map) => map,
            _ => return Err("top level must be a mapping of source -> rules".to_string()),
        };

        for (key, rules) in root {
            let name = key.as_str().ok_or("source keys must be strings")?;
            let source: Source = name.parse()?;
            let parsed = match rules {
                Value::Null => Vec::new(),
                Value::Sequence(items) => items
                    .iter()
                    .map(parse_list_entry)
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                Value::Mapping(map) => map
                    .iter()
                    .map(|(intent, keywords)| {
                        let intent = intent.as_str().ok_or("intent keys must be strings")?;
                        Ok(IntentRule::new(intent.parse()?, parse_keywords(keywords)?))
                    })
                    .collect::<std::result::Result<Vec<_>, String>>()?,
                _ => return Err(format!("rules for '{}' must be a list or a mapping", name)),
            };
            table.rules.insert(source, parsed);
        }

        Ok(table)
    }

    /// Rules for a source in table order; empty when the source has none.
    pub fn rules_for(&self, source: Source) -> &[IntentRule] {
        self.rules.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First intent, in table order, with a keyword contained in the text.
    pub fn first_match(&self, source: Source, text_lower: &str) -> Option<Intent> {
        self.rules_for(source)
            .iter()
            .find(|rule| rule.matches(text_lower))
            .map(|rule| rule.intent)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty)
    }
}

fn parse_list_entry(item: &Value) -> std::result::Result<IntentRule, String> {
    let intent = item
        .get("intent")
        .and_then(Value::as_str)
        .ok_or("list entries need an 'intent' string")?;
    let keywords = item.get("keywords").unwrap_or(&Value::Null);
    Ok(IntentRule::new(intent.parse()?, parse_keywords(keywords)?))
}

fn parse_keywords(value: &Value) -> std::result::Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.iter().map(scalar_to_string).collect(),
        other => Ok(vec![scalar_to_string(other)?]),
    }
}

fn scalar_to_string(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err("keywords must be scalars".to_string()),
    }
}
