//! Field rules for resource payloads and identifier shape checks.
//!
//! Rule messages are reported in a fixed order: object shape, `name`, `count`,
//! `tags`. A payload that is not a JSON object stops at the first rule.

use serde_json::Value;
use uuid::{Uuid, Version};

use crate::domain::ResourceDraft;
use crate::framework::Violations;

pub const NOT_AN_OBJECT: &str = "Request body must be a valid JSON object";
pub const INVALID_NAME: &str = "Name is required and must be a non-empty string";
pub const INVALID_COUNT: &str = "Count is required and must be a non-negative integer";
pub const TAGS_NOT_ARRAY: &str = "Tags is required and must be an array";
pub const TAGS_NOT_STRINGS: &str = "All tags must be strings";

/// Checks a candidate payload and extracts the validated fields.
///
/// Unknown keys, including a client-supplied `id`, are ignored.
pub fn validate_resource(data: &Value) -> Result<ResourceDraft, Violations> {
    let Some(object) = data.as_object() else {
        return Err(vec![NOT_AN_OBJECT.to_string()]);
    };

    let mut errors = Vec::new();

    let name = match object.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => {
            errors.push(INVALID_NAME.to_string());
            None
        }
    };

    let count = object.get("count").and_then(non_negative_integer);
    if count.is_none() {
        errors.push(INVALID_COUNT.to_string());
    }

    let tags = match object.get("tags") {
        Some(Value::Array(items)) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            if strings.is_none() {
                errors.push(TAGS_NOT_STRINGS.to_string());
            }
            strings
        }
        _ => {
            errors.push(TAGS_NOT_ARRAY.to_string());
            None
        }
    };

    match (name, count, tags) {
        (Some(name), Some(count), Some(tags)) if errors.is_empty() => {
            Ok(ResourceDraft { name, count, tags })
        }
        _ => Err(errors),
    }
}

/// Whole, non-negative JSON numbers, including float spellings such as `30.0`
/// or `3e1`.
fn non_negative_integer(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    // 2^64 is exactly representable; anything at or above it does not fit.
    (f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

/// Parses an identifier that has the canonical hyphenated UUID-v4 shape.
///
/// Other textual UUID forms (simple, braced, URN) and other versions are
/// rejected: no stored resource could ever carry them.
pub fn parse_resource_id(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    Uuid::parse_str(raw)
        .ok()
        .filter(|id| id.get_version() == Some(Version::Random))
}
