//! Strict-schema handling of LLM output.
//!
//! Small models wrap their JSON in prose, markdown fences, or stray
//! whitespace. The extractor finds the first `{` and walks a depth
//! counter to its matching `}`; only that slice is parsed.

use crate::intent::{Intent, CANONICAL_TAGS};

/// Result of coercing raw LLM output into an intent.
#[derive(Debug, PartialEq)]
pub enum Coercion {
    /// A well-formed intent with a canonical tag.
    Intent(Intent),
    /// JSON parsed but the tag is not in the canonical set.
    UnknownTag(String),
    /// No parseable JSON object, or fields did not match the schema.
    Malformed,
}

/// Extract the first balanced `{…}` object from `raw`.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Coerce raw LLM output into an [`Intent`].
#[must_use]
pub fn coerce_intent(raw: &str) -> Coercion {
    let Some(chunk) = extract_json_object(raw) else {
        return Coercion::Malformed;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(chunk) else {
        return Coercion::Malformed;
    };
    let Some(tag) = value.get("intent").and_then(|t| t.as_str()) else {
        return Coercion::Malformed;
    };
    if !CANONICAL_TAGS.contains(&tag) {
        return Coercion::UnknownTag(tag.to_owned());
    }
    match serde_json::from_value::<Intent>(value) {
        Ok(intent) => Coercion::Intent(intent),
        Err(_) => Coercion::Malformed,
    }
}
