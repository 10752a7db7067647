//! Recover one JSON object from free-form LLM output
//!
//! Models wrap JSON in prose or code fences even when told not to. The
//! extractor first tries the whole text, then falls back to the first balanced
//! `{ ... }` block. The block scanner tracks string literals, so braces inside
//! quoted values do not end the object early. Malformed JSON inside the block
//! is reported, never repaired.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::retry::{Classify, FailureClass};

/// Why no object could be recovered
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object present in response")]
    NoObject,

    #[error("unterminated JSON object starting at byte {start}")]
    Unterminated { start: usize },

    #[error("invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

impl Classify for ExtractError {
    fn failure_class(&self) -> FailureClass {
        FailureClass::Parse
    }
}

/// Locate the first balanced top-level `{ ... }` block
///
/// Returns the byte range of the block, or `None` when there is no `{`.
fn find_object_span(text: &str) -> Result<(usize, usize), ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NoObject)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    Err(ExtractError::Unterminated { start })
}

/// Parse the single JSON object contained in `text`
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, ExtractError> {
    debug!(text_len = text.len(), "extract_json_object: called");
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim())
        && value.is_object()
    {
        debug!("extract_json_object: direct parse succeeded");
        return Ok(value);
    }

    let (start, end) = find_object_span(text)?;
    debug!(start, end, "extract_json_object: parsing embedded block");
    Ok(serde_json::from_str(&text[start..end])?)
}

/// Extract the object and decode it into `T`
///
/// Missing required fields surface as [`ExtractError::Invalid`], the same
/// parse-tier failure as malformed JSON.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let value = extract_json_object(text)?;
    Ok(serde_json::from_value(value)?)
}
