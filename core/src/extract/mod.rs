//! Structured extraction from generated text
//!
//! Model output is treated as adversarial input: it may echo the prompt
//! (including exemplar JSON), be wrapped in quotes or code fences, or be cut
//! off when the token budget runs out. Extraction runs an ordered list of
//! stages and stops at the first one that yields an object:
//!
//! 1. unwrap literal quoting
//! 2. isolate the region after the last turn-boundary marker
//! 3. scan balanced `{...}` candidates, rightmost wins
//! 4. strict decode
//! 5. repair and retry (lenient paths only)
//! 6. field-level regex salvage (command path only)
//!
//! All functions here are pure: no IO, no randomness.

mod command;

pub use command::{CommandAction, CommandPayload};

use crate::error::{Result, RouterError};
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Structured object recovered from text
pub type StructuredObject = Map<String, Value>;

/// Turn markers recognised when none are configured
pub const DEFAULT_TURN_MARKERS: [&str; 3] = [
    "<|start_header_id|>assistant<|end_header_id|>",
    "<|im_start|>assistant",
    "[/INST]",
];

/// Stage that produced an extracted object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Strict,
    Repaired,
    Salvaged,
}

/// How far down the fallback chain an extraction may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    /// Stages 1-4
    Strict,
    /// Stages 1-5
    Repair,
}

#[derive(Debug, Clone)]
pub struct StructuredExtractor {
    turn_markers: Vec<String>,
}

impl Default for StructuredExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TURN_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl StructuredExtractor {
    pub fn new(turn_markers: Vec<String>) -> Self {
        let turn_markers = turn_markers
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect();
        Self { turn_markers }
    }

    /// Classification path: strict parse only.
    pub fn extract_object(&self, text: &str) -> Result<StructuredObject> {
        self.extract_with(text, Depth::Strict).map(|(obj, _)| obj)
    }

    /// Parameter path: strict parse, then repair.
    pub fn extract_params(&self, text: &str) -> Result<StructuredObject> {
        self.extract_with(text, Depth::Repair).map(|(obj, _)| obj)
    }

    /// Command path: the full chain, followed by command validation.
    pub fn extract_command(&self, text: &str) -> Result<CommandPayload> {
        let region = self.prepare(text);

        let found = match self.decode_chain(&region, Depth::Repair) {
            Some(hit) => Some(hit),
            None => salvage_command_fields(&region).map(|obj| (obj, Stage::Salvaged)),
        };

        let Some((object, stage)) = found else {
            tracing::warn!("no command object recoverable from model output");
            return Err(RouterError::extraction(
                "no recoverable command object in model output",
                text,
            ));
        };

        tracing::debug!(?stage, "command object extracted");
        CommandPayload::from_object(&object)
    }

    fn extract_with(&self, text: &str, depth: Depth) -> Result<(StructuredObject, Stage)> {
        let region = self.prepare(text);
        match self.decode_chain(&region, depth) {
            Some((object, stage)) => {
                tracing::debug!(?stage, keys = object.len(), "object extracted");
                Ok((object, stage))
            }
            None => Err(RouterError::extraction(
                "no JSON object found in model output",
                text,
            )),
        }
    }

    /// Stages 1 and 2
    fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match unwrap_literal_quoting(text) {
            Cow::Borrowed(t) => Cow::Borrowed(isolate_generation(t, &self.turn_markers)),
            Cow::Owned(t) => Cow::Owned(isolate_generation(&t, &self.turn_markers).to_string()),
        }
    }

    /// Stages 3 to 5, in order
    fn decode_chain(&self, region: &str, depth: Depth) -> Option<(StructuredObject, Stage)> {
        if let Some(candidate) = last_object_candidate(region) {
            if let Some(obj) = decode_object(candidate) {
                return Some((obj, Stage::Strict));
            }
            tracing::debug!("strict decode of rightmost candidate failed");
        }

        if depth == Depth::Repair {
            if let Some(obj) = repair_candidate(region).and_then(|r| decode_object(&r)) {
                return Some((obj, Stage::Repaired));
            }
            tracing::debug!("repair stage failed");
        }

        None
    }
}

/// Stage 1: if the whole text is one quoted string literal, unescape it.
///
/// On unescape failure the original text is kept.
pub fn unwrap_literal_quoting(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return Cow::Borrowed(text);
    };
    if first != last || !(first == '"' || first == '\'') {
        return Cow::Borrowed(text);
    }

    let unescaped = if first == '"' {
        serde_json::from_str::<String>(trimmed).ok()
    } else {
        single_quoted_to_json(&trimmed[1..trimmed.len() - 1])
            .and_then(|json| serde_json::from_str::<String>(&json).ok())
    };

    match unescaped {
        Some(inner) => Cow::Owned(inner),
        None => Cow::Borrowed(text),
    }
}

/// Rewrite the body of a single-quoted literal as a JSON string literal.
fn single_quoted_to_json(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len() + 2);
    out.push('"');
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next()? {
                '\'' => out.push('\''),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            // an unescaped quote of the same kind means this was not one literal
            '\'' => return None,
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    Some(out)
}

/// Stage 2: keep only what follows the last turn-boundary marker.
pub fn isolate_generation<'a>(text: &'a str, markers: &[String]) -> &'a str {
    markers
        .iter()
        .filter_map(|m| text.rfind(m.as_str()).map(|pos| pos + m.len()))
        .max()
        .map(|end| &text[end..])
        .unwrap_or(text)
}

fn object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").expect("valid regex"))
}

/// Stage 3: every balanced `{...}` substring (one level of nesting), left to right.
pub fn extract_object_candidates(text: &str) -> Vec<&str> {
    object_regex().find_iter(text).map(|m| m.as_str()).collect()
}

/// The rightmost candidate: the model's final statement beats any earlier exemplar.
pub fn last_object_candidate(text: &str) -> Option<&str> {
    object_regex().find_iter(text).last().map(|m| m.as_str())
}

/// Stage 4
fn decode_object(candidate: &str) -> Option<StructuredObject> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Stage 5: patch the usual truncation and formatting damage.
///
/// Every edit is string-aware: text inside JSON string values is never
/// trimmed or rewritten, only closed. Returns `None` when there is no
/// opening brace to work from.
pub fn repair_candidate(region: &str) -> Option<String> {
    let body = strip_code_fence(region);
    let start = last_top_level_open(body)?;

    let mut repaired = body[start..].trim_end().to_string();

    if has_open_string(&repaired) {
        repaired.push('"');
    } else {
        // stray quoting after the object, e.g. `{...}'` or a lone backtick
        let kept = repaired
            .trim_end_matches(|c: char| c == '\'' || c == '`' || c.is_whitespace())
            .len();
        repaired.truncate(kept);
    }

    let (open, close) = count_braces(&repaired);
    if open > close {
        repaired.push_str(&"}".repeat(open - close));
    }

    Some(strip_trailing_commas(&repaired))
}

/// Drop a `,` that is followed only by whitespace and then `}` or `]`,
/// outside of string literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = text[i + 1..].trim_start().chars().next();
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Body of the last fenced block, or the text unchanged when there is no fence.
///
/// An unterminated fence (truncated output) runs to the end of the text.
pub fn strip_code_fence(text: &str) -> &str {
    let mut last_block: Option<&str> = None;
    let mut search_from = 0usize;

    while let Some(rel_open) = text[search_from..].find("```") {
        let after_fence = search_from + rel_open + 3;
        let content_start = match text[after_fence..].find('\n') {
            Some(rel_nl) => after_fence + rel_nl + 1,
            None => {
                last_block = Some(&text[after_fence..]);
                break;
            }
        };

        match text[content_start..].find("```") {
            Some(rel_close) => {
                let content_end = content_start + rel_close;
                last_block = Some(&text[content_start..content_end]);
                search_from = content_end + 3;
            }
            None => {
                last_block = Some(&text[content_start..]);
                break;
            }
        }
    }

    last_block.map(str::trim).unwrap_or(text)
}

/// Byte offset of the last `{` that opens a top-level object, string-aware.
fn last_top_level_open(text: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escape = false;
    let mut depth: i32 = 0;
    let mut last_start = None;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    last_start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                }
            }
            _ => {}
        }
    }

    last_start
}

/// Whether the text ends inside an unterminated JSON string.
fn has_open_string(text: &str) -> bool {
    let mut in_string = false;
    let mut escape = false;
    for ch in text.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    in_string
}

/// Count braces outside of string literals.
fn count_braces(text: &str) -> (usize, usize) {
    let mut in_string = false;
    let mut escape = false;
    let (mut open, mut close) = (0usize, 0usize);
    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => open += 1,
            '}' => close += 1,
            _ => {}
        }
    }
    (open, close)
}

fn field_regex(field: &str) -> Regex {
    let pattern = format!(
        r#"["']{}["']\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#,
        regex::escape(field)
    );
    Regex::new(&pattern).expect("valid regex")
}

fn salvage_regexes() -> &'static [(&'static str, Regex); 3] {
    static RES: OnceLock<[(&'static str, Regex); 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            ("path", field_regex("path")),
            ("command", field_regex("command")),
            ("content", field_regex("content")),
        ]
    })
}

/// Last string value of a field, unescaped as JSON when possible.
fn salvage_field(re: &Regex, region: &str) -> Option<String> {
    let caps = re.captures_iter(region).last()?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string()))
}

/// Stage 6: pull `path`, `command` and `content` out one by one.
///
/// Succeeds only when both `path` and `command` are present.
fn salvage_command_fields(region: &str) -> Option<StructuredObject> {
    let mut object = Map::new();
    for (name, re) in salvage_regexes() {
        if let Some(value) = salvage_field(re, region) {
            object.insert((*name).to_string(), Value::String(value));
        }
    }

    if object.contains_key("path") && object.contains_key("command") {
        Some(object)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> StructuredExtractor {
        StructuredExtractor::default()
    }

    #[test]
    fn test_extract_object_candidates() {
        let content = r#"Some text {"key": "value"} more text {"num": 42}"#;
        let objects = extract_object_candidates(content);

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], r#"{"key": "value"}"#);
        assert_eq!(objects[1], r#"{"num": 42}"#);
    }

    #[test]
    fn test_extract_object_candidates_nested() {
        let content = r#"{"outer": {"inner": "value"}}"#;
        let objects = extract_object_candidates(content);

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0], r#"{"outer": {"inner": "value"}}"#);
    }

    #[test]
    fn rightmost_object_wins() {
        let text = r#"Example: {"source": "code", "confidence": 0.1}
Answer: {"source": "web", "confidence": 0.9}"#;
        let obj = extractor().extract_object(text).unwrap();
        assert_eq!(obj["source"], "web");
        assert_eq!(obj["confidence"], 0.9);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = r#"noise {"a": 1} {"b": {"c": 2}} tail"#;
        let first = extractor().extract_object(text).unwrap();
        let second = extractor().extract_object(text).unwrap();
        assert_eq!(first, second);
        assert!(first.contains_key("b"));
    }

    #[test]
    fn region_after_last_marker_is_used() {
        let text = "system\nRespond like {\"source\": \"policy\", \"confidence\": 1.0}\
                    <|im_start|>assistant\n{\"source\": \"web\", \"confidence\": 0.7}";
        let obj = extractor().extract_object(text).unwrap();
        assert_eq!(obj["source"], "web");
    }

    #[test]
    fn no_marker_uses_entire_text() {
        let markers = vec!["<|im_start|>assistant".to_string()];
        assert_eq!(isolate_generation("plain text", &markers), "plain text");
    }

    #[test]
    fn quoted_output_is_unwrapped() {
        let text = r#""{\"source\": \"code\", \"confidence\": 0.8}""#;
        let obj = extractor().extract_object(text).unwrap();
        assert_eq!(obj["source"], "code");
    }

    #[test]
    fn single_quoted_output_is_unwrapped() {
        let unwrapped = unwrap_literal_quoting(r#"'{"path": "it\'s.py"}'"#);
        assert_eq!(unwrapped, r#"{"path": "it's.py"}"#);
    }

    #[test]
    fn bad_quoting_keeps_original() {
        let text = r#""abc" and "def""#;
        assert_eq!(unwrap_literal_quoting(text), text);
    }

    #[test]
    fn strict_path_does_not_repair() {
        let err = extractor()
            .extract_object(r#"{"source": "web", "confidence": 0.9"#)
            .unwrap_err();
        assert!(matches!(err, RouterError::Extraction { .. }));
    }

    #[test]
    fn non_json_is_an_extraction_error() {
        let err = extractor().extract_object("I think this is about the web.").unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }

    #[test]
    fn params_path_repairs_truncation() {
        let obj = extractor().extract_params(r#"{"q": "TSLA:NASDAQ", "hl": "ko","#).unwrap();
        assert_eq!(obj["q"], "TSLA:NASDAQ");
        assert_eq!(obj["hl"], "ko");
    }

    #[test]
    fn repair_appends_missing_brace() {
        let repaired = repair_candidate(r#"{"path": "a.py", "command": "run""#).unwrap();
        assert_eq!(repaired, r#"{"path": "a.py", "command": "run"}"#);
    }

    #[test]
    fn repair_strips_fence_and_trailing_comma() {
        let text = "```json\n{\"path\": \"a.py\", \"command\": \"run\",}\n```";
        let repaired = repair_candidate(text).unwrap();
        assert_eq!(repaired, r#"{"path": "a.py", "command": "run"}"#);
    }

    #[test]
    fn repair_closes_truncated_string() {
        let repaired = repair_candidate(r#"{"path": "a.py", "content": "print(1)"#).unwrap();
        let obj = decode_object(&repaired).unwrap();
        assert_eq!(obj["content"], "print(1)");
    }

    #[test]
    fn repair_keeps_commas_inside_strings() {
        let repaired = repair_candidate(r#"{"content": "xs = [1, 2,]", "n": [1, 2,],"#).unwrap();
        let obj = decode_object(&repaired).unwrap();
        assert_eq!(obj["content"], "xs = [1, 2,]");
        assert_eq!(obj["n"], serde_json::json!([1, 2]));
    }

    #[test]
    fn repair_keeps_quote_ending_a_truncated_string() {
        let repaired = repair_candidate(r#"{"content": "print('hi'"#).unwrap();
        let obj = decode_object(&repaired).unwrap();
        assert_eq!(obj["content"], "print('hi'");
    }

    #[test]
    fn repair_drops_stray_quote_after_object() {
        let repaired = repair_candidate("{\"a\": 1,}'").unwrap();
        assert_eq!(repaired, r#"{"a": 1}"#);
    }

    #[test]
    fn strip_code_fence_handles_unterminated_block() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1"), "{\"a\": 1");
        assert_eq!(strip_code_fence("no fence"), "no fence");
    }

    #[test]
    fn salvage_requires_path_and_command() {
        let obj = salvage_command_fields(r#"garbage "path": "x.py" junk "command": "exec""#).unwrap();
        assert_eq!(obj["path"], "x.py");
        assert_eq!(obj["command"], "exec");
        assert!(salvage_command_fields(r#""path": "x.py""#).is_none());
    }
}
