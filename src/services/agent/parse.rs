//! Defensive JSON Parsing
//!
//! Every structured LLM helper funnels its raw model text through these two
//! functions. Models wrap JSON in markdown fences, prepend prose, or nest
//! objects where a scalar string was requested; the helpers normalize all of
//! that in one place instead of per call site.

use serde_json::Value;

/// Extract a JSON object from LLM response text.
///
/// Tries, in order: a ```json fence, a bare fence whose body starts with
/// `{`, and finally the outermost `{...}` span of the raw text.
pub fn extract_json_object(text: &str) -> Option<String> {
    // Try to find JSON in code fences first
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim().to_string());
        }
    }
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip optional language identifier on first line
        let after_lang = if let Some(nl) = after_fence.find('\n') {
            &after_fence[nl + 1..]
        } else {
            after_fence
        };
        if let Some(end) = after_lang.find("```") {
            let content = after_lang[..end].trim();
            if content.starts_with('{') {
                return Some(content.to_string());
            }
        }
    }
    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return Some(text[start..=end].to_string());
            }
        }
    }
    None
}

/// Coerce a parsed JSON value into the string the schema asked for.
///
/// Models sometimes nest structured data where a plain string was requested;
/// those are serialized to pretty-printed JSON rather than rejected. Null and
/// missing values become the empty string, scalars are stringified.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    }
}

/// Coerce an optional field of a parsed object into a string.
pub fn coerce_field_to_string(object: &Value, field: &str) -> String {
    object
        .get(field)
        .map(coerce_to_string)
        .unwrap_or_default()
}

/// Read an optional array-of-strings field, dropping non-string entries.
pub fn string_array_field(object: &Value, field: &str) -> Vec<String> {
    object
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
