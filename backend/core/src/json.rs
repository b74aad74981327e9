//! Helpers for pulling structured JSON out of free-form model output.
//!
//! Models often wrap JSON in prose or markdown fences, so the outermost
//! brace (or bracket) span is located greedily and parsed on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{OcrAgentsError, Result};

static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());
static ARRAY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[\s\S]*\]").unwrap());

/// Parse the greedy `{ ... }` span of `text` as a JSON object.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let span = OBJECT_SPAN
        .find(text)
        .ok_or(OcrAgentsError::NoJsonFound)?;
    let value: Value = serde_json::from_str(span.as_str())
        .map_err(|e| OcrAgentsError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(OcrAgentsError::MalformedResponse("expected a JSON object".into()));
    }
    Ok(value)
}

/// Parse the greedy `[ ... ]` span of `text` as a JSON array.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>> {
    let span = ARRAY_SPAN
        .find(text)
        .ok_or(OcrAgentsError::NoJsonFound)?;
    match serde_json::from_str(span.as_str()) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(OcrAgentsError::MalformedResponse("expected a JSON array".into())),
        Err(e) => Err(OcrAgentsError::MalformedResponse(e.to_string())),
    }
}

/// Fail unless every key in `required` is present on `value`.
pub fn require_keys(value: &Value, required: &[&str], what: &str) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| value.get(k).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OcrAgentsError::MalformedResponse(format!(
            "Invalid {what} response format (missing: {})",
            missing.join(", ")
        )))
    }
}

/// First `max` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Rough page count of joined OCR markdown: one more than the number of blank-line separators.
pub fn estimate_pages(markdown: &str) -> usize {
    markdown.matches("\n\n").count() + 1
}
