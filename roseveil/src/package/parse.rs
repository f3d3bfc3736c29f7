//! Tolerant JSON parsing for documents served by misbehaving hosts.
//!
//! Some CDNs and shared hosts wrap JSON in a byte-order mark, HTML error
//! fragments, or trailing log noise. The tolerant parser strips a leading
//! BOM, then parses only the span from the first `{`/`[` to the last `}`/`]`.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Characters of the raw text quoted when no JSON start is found.
const RAW_SNIPPET_CHARS: usize = 120;

/// Characters of the extracted span quoted when it fails to parse.
const CORE_SNIPPET_CHARS: usize = 80;

/// Failure to locate or parse a JSON document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}. Near: {snippet}")]
pub struct JsonParseError {
    /// What went wrong.
    pub reason: String,
    /// The leading part of the offending text.
    pub snippet: String,
}

/// Locate the JSON span inside `text`.
///
/// Returns `None` when the text contains neither `{` nor `[`.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']']).map(|i| i + 1).unwrap_or(text.len());
    if end <= start {
        return Some("");
    }
    Some(text[start..end].trim())
}

/// Parse `text` as `T`, tolerating wrapping noise around the JSON.
///
/// # Example
///
/// ```
/// use roseveil::package::parse_tolerant;
///
/// let value: serde_json::Value =
///     parse_tolerant("\u{feff}<pre>{\"version\":\"1.0.1\"}</pre>\n").unwrap();
/// assert_eq!(value["version"], "1.0.1");
/// ```
pub fn parse_tolerant<T: DeserializeOwned>(text: &str) -> Result<T, JsonParseError> {
    let Some(core) = extract_json_span(text) else {
        return Err(JsonParseError {
            reason: "no JSON start".to_string(),
            snippet: head(text, RAW_SNIPPET_CHARS),
        });
    };

    serde_json::from_str(core).map_err(|e| JsonParseError {
        reason: format!("JSON parse error: {e}"),
        snippet: head(core, CORE_SNIPPET_CHARS),
    })
}

/// Parse raw response bytes (lossy UTF-8) tolerantly.
pub fn parse_tolerant_bytes<T: DeserializeOwned>(body: &[u8]) -> Result<T, JsonParseError> {
    parse_tolerant(&String::from_utf8_lossy(body))
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
