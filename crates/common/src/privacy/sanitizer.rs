use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Replacement written in place of a redacted value.
pub const MASK: &str = "***";

/// Upper bound for a stored request or response body.
pub const MAX_BODY_BYTES: usize = 65_536;

const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "x-api-key", "set-cookie"];

const SENSITIVE_BODY_KEYS: [&str; 4] = ["transfereemobile", "transfreemobile", "mobile", "phone"];

static SENSITIVE_BODY_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?i)("?(?:transfereemobile|transfreemobile|mobile|phone)"?\s*:\s*")([^"\\]*)("?)"#)
        .ok()
});

/// Group headers by lowercase name and redact credential values.
pub fn sanitize_headers<'a, I>(headers: I) -> Value
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut grouped = Map::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        let value = if SENSITIVE_HEADERS.contains(&name.as_str()) { MASK } else { value };
        match grouped.entry(name).or_insert_with(|| Value::Array(Vec::new())) {
            Value::Array(values) => values.push(Value::String(value.to_string())),
            other => *other = Value::Array(vec![Value::String(value.to_string())]),
        }
    }
    Value::Object(grouped)
}

/// Mask contact-number fields in a body.
///
/// JSON objects and arrays are re-encoded with masked string values at any
/// depth; anything else goes through a regex fallback.
pub fn sanitize_body(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(mut value @ (Value::Object(_) | Value::Array(_))) => {
            mask_sensitive_values(&mut value);
            serde_json::to_string(&value).unwrap_or_else(|_| trimmed.to_string())
        }
        _ => match SENSITIVE_BODY_PATTERN.as_ref() {
            Some(pattern) => pattern.replace_all(trimmed, format!("${{1}}{MASK}${{3}}")).into_owned(),
            None => trimmed.to_string(),
        },
    }
}

fn mask_sensitive_values(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if entry.is_object() || entry.is_array() {
                    mask_sensitive_values(entry);
                } else if entry.is_string()
                    && SENSITIVE_BODY_KEYS.contains(&key.to_ascii_lowercase().as_str())
                {
                    *entry = Value::String(MASK.to_string());
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_sensitive_values),
        _ => {}
    }
}

/// Longest prefix of `value` within `max_bytes` that ends on a char boundary.
pub fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Sanitised, truncated body wrapped as `{"raw": ...}`; `None` when empty.
pub fn audit_body(raw: &str) -> Option<Value> {
    let sanitized = sanitize_body(raw);
    if sanitized.is_empty() {
        return None;
    }
    let mut wrapper = Map::new();
    wrapper.insert(
        "raw".to_string(),
        Value::String(truncate_utf8(&sanitized, MAX_BODY_BYTES).to_string()),
    );
    Some(Value::Object(wrapper))
}
