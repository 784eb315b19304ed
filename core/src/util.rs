//! Credential and endpoint checks shared by the HTTP clients

use crate::error::{Result, RouterError};

/// Reject values that cannot travel in an HTTP header or query string.
///
/// Control characters, DEL, CR, LF and NUL are refused.
pub fn check_header_safe(value: &str, field_name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RouterError::validation(format!("{} cannot be empty", field_name)));
    }

    if let Some((index, ch)) = value.char_indices().find(|(_, ch)| ch.is_ascii_control()) {
        return Err(RouterError::validation(format!(
            "{} contains a control character at position {} ({:#04x})",
            field_name, index, ch as u32
        )));
    }

    Ok(())
}

/// Trimmed API key, or an error when it is blank, `none`, or not header-safe.
pub fn validate_api_key(api_key: &str, field_name: &str) -> Result<String> {
    let trimmed = api_key.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Err(RouterError::validation(format!("{} is empty or set to 'none'", field_name)));
    }

    check_header_safe(trimmed, field_name)?;

    format!("Bearer {}", trimmed)
        .parse::<reqwest::header::HeaderValue>()
        .map_err(|_| {
            RouterError::validation(format!(
                "{} is not valid in an Authorization header ({} characters)",
                field_name,
                trimmed.len()
            ))
        })?;

    Ok(trimmed.to_string())
}

/// Trimmed base URL with the trailing slash removed.
///
/// Percent-encoded separators usually mean the value was encoded twice.
pub fn sanitize_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err(RouterError::validation(format!("{} cannot be empty", field_name)));
    }

    if ["%2F", "%3D", "%20"].iter().any(|enc| trimmed.contains(enc)) {
        return Err(RouterError::validation(format!(
            "{} contains URL-encoded characters (%2F, %3D, %20); check it is not double-encoded",
            field_name
        )));
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(RouterError::validation(format!(
            "{} must start with 'http://' or 'https://'. Got: {}",
            field_name, trimmed
        )));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Truncate on a char boundary at or below `max_bytes`, appending a marker.
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n... [output truncated, {} bytes total]", &text[..cut], text.len())
}
