use log::warn;
use serde_json::Value;

use super::fields::max_length;

/// Trims surrounding whitespace and enforces the field's maximum length.
///
/// Fields without a configured limit are only trimmed. Truncation counts
/// characters, not bytes, and never leaves trailing whitespace behind.
pub fn sanitize_string(value: &str, field: &str) -> String {
    let trimmed = value.trim();

    match max_length(field) {
        Some(max) => {
            let len = trimmed.chars().count();
            if len > max {
                warn!("Field '{field}' truncated from {len} to {max} chars");
                let truncated: String = trimmed.chars().take(max).collect();
                truncated.trim_end().to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => trimmed.to_string(),
    }
}

/// Keeps only the digits of a phone number: `"070-123 45 67"` becomes `"0701234567"`.
pub fn sanitize_phone(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Normalizes a personal identity number such as `"19900101-1234"` to `"199001011234"`.
pub fn sanitize_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .filter(char::is_ascii_digit)
        .collect()
}

/// Applies `sanitize` to string values; anything else is returned unchanged.
pub(crate) fn map_text(value: &Value, sanitize: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(text) => Value::String(sanitize(text)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phone_keeps_digits_only() {
        assert_eq!(sanitize_phone("070-123 45 67"), "0701234567");
        assert_eq!(sanitize_phone("+46 70 123 45 67"), "46701234567");
        assert_eq!(sanitize_phone("n/a"), "");
    }

    #[test]
    fn id_drops_separator() {
        assert_eq!(sanitize_id("19900101-1234"), "199001011234");
        assert_eq!(sanitize_id("900101-1234"), "9001011234");
        assert_eq!(sanitize_id(" 9001 01 1234 "), "9001011234");
    }

    #[test]
    fn string_is_trimmed() {
        assert_eq!(sanitize_string("  Viktor ", "name"), "Viktor");
        assert_eq!(sanitize_string("\tfree text\n", "comment"), "free text");
    }

    #[test]
    fn string_is_truncated_to_field_limit() {
        let long = "A".repeat(200);
        assert_eq!(sanitize_string(&long, "name").len(), 100);
        assert_eq!(sanitize_string(&long, "Name").len(), 100);
        assert_eq!(sanitize_string(&long, "discord").len(), 50);
        assert_eq!(sanitize_string(&long, "unknown").len(), 200);
    }

    #[test]
    fn truncation_counts_characters() {
        let long = "å".repeat(40);
        let result = sanitize_string(&long, "tag");
        assert_eq!(result.chars().count(), 30);
    }

    #[test]
    fn truncated_string_has_no_trailing_whitespace() {
        let value = format!("{} tail", "b".repeat(29));
        let result = sanitize_string(&value, "tag");
        assert_eq!(result, "b".repeat(29));
    }

    #[test]
    fn sanitized_strings_respect_limits_for_every_field() {
        let long = "z ".repeat(300);
        let samples = ["", "   ", " x ", "  padded value  ", long.as_str()];
        let fields = ["namn", "name", "phone", "telefon", "tag", "nick", "email", "discord", "personal_id"];
        for field in fields {
            let max = max_length(field).unwrap();
            for sample in samples {
                let result = sanitize_string(sample, field);
                assert!(result.chars().count() <= max, "{field}: {result:?}");
                assert_eq!(result, result.trim(), "{field}: {result:?}");
            }
        }
    }

    #[test]
    fn non_strings_pass_through() {
        assert_eq!(map_text(&json!(42), sanitize_phone), json!(42));
        assert_eq!(map_text(&json!(null), sanitize_phone), json!(null));
        assert_eq!(map_text(&json!("07-0"), sanitize_phone), json!("070"));
    }
}
