//! Server-side rules for check-in payloads.
//!
//! These are stricter than the form checks: a tag is mandatory, and every
//! supplied phone or personal ID field is validated, not just the first one.

use std::collections::BTreeSet;

use serde_json::Value;

use super::fields::{
    canonical_missing_key, ID_DIGIT_COUNTS, ID_FIELDS, LEGACY_MISSING_FIELD, MISSING_FIELD,
    NAME_FIELDS, PHONE_MIN_DIGITS, SERVER_PHONE_FIELDS, STRING_FIELDS, TAG_FIELDS,
};
use super::form::FormData;
use super::sanitize::{sanitize_id, sanitize_phone, sanitize_string};

/// Lowercases and de-aliases outstanding requirement keys.
///
/// `["StartGG", "Betalning", "swish"]` becomes `["payment", "startgg"]`.
/// Non-string items are dropped; the result is sorted.
pub fn normalize_missing_keys(keys: &[Value]) -> Vec<String> {
    let normalized: BTreeSet<String> = keys
        .iter()
        .filter_map(Value::as_str)
        .map(|item| {
            let key = item.trim().to_lowercase();
            match canonical_missing_key(&key) {
                Some(canonical) => canonical.to_string(),
                None => key,
            }
        })
        .collect();

    normalized.into_iter().collect()
}

pub fn sanitize_checkin_payload(data: &FormData) -> FormData {
    let mut result = data.clone();
    result.apply(STRING_FIELDS, sanitize_string);
    result.apply(SERVER_PHONE_FIELDS, |value, _| sanitize_phone(value));
    result.apply(ID_FIELDS, |value, _| sanitize_id(value));

    if let Some(Value::Array(legacy)) = result.get(LEGACY_MISSING_FIELD) {
        let normalized = normalize_missing_keys(legacy);
        result.remove(LEGACY_MISSING_FIELD);
        result.insert(MISSING_FIELD, normalized);
    }
    if let Some(Value::Array(missing)) = result.get(MISSING_FIELD) {
        let normalized = normalize_missing_keys(missing);
        result.insert(MISSING_FIELD, normalized);
    }

    result
}

pub fn validate_checkin_payload(data: &FormData) -> Vec<String> {
    let mut errors = Vec::new();

    let has_text = |fields: &[&str]| {
        fields
            .iter()
            .filter_map(|field| data.text(field))
            .any(|value| !value.trim().is_empty())
    };

    if !has_text(NAME_FIELDS) {
        errors.push("Name is required".to_string());
    }
    if !has_text(TAG_FIELDS) {
        errors.push("Tag/gamertag is required".to_string());
    }

    for field in ID_FIELDS {
        let Some(raw) = supplied(data, field) else {
            continue;
        };
        let digits = sanitize_id(&raw).len();
        if digits > 0 && !ID_DIGIT_COUNTS.contains(&digits) {
            errors.push(format!(
                "Invalid personal ID format (expected 10 or 12 digits, got {digits})"
            ));
        }
    }

    for field in SERVER_PHONE_FIELDS {
        let Some(raw) = supplied(data, field) else {
            continue;
        };
        let digits = sanitize_phone(&raw).len();
        if digits > 0 && digits < PHONE_MIN_DIGITS {
            errors.push(format!(
                "Phone number too short (minimum {PHONE_MIN_DIGITS} digits)"
            ));
        }
    }

    errors
}

/// Text form of a supplied value: numbers count, empty and null values do not.
fn supplied(data: &FormData, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
