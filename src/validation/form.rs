use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{
    ID_DIGIT_COUNTS, ID_FIELDS, NAME_FIELDS, NAME_MAX_LEN, PHONE_FIELDS, PHONE_MIN_DIGITS,
    STRING_FIELDS, TAG_FIELDS, TAG_MAX_LEN,
};
use super::sanitize::{map_text, sanitize_id, sanitize_phone, sanitize_string};

/// One submitted check-in form: field name to raw value.
///
/// Values are kept as JSON so that malformed (non-string) input survives a
/// round trip untouched instead of being rejected at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(Map<String, Value>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field's value when it is a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// First non-empty string among `fields`, or `""` when none is present.
    pub fn first_text(&self, fields: &[&str]) -> &str {
        fields
            .iter()
            .filter_map(|field| self.text(field))
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Rewrites every field in `fields` that holds a non-empty string.
    pub(crate) fn apply(&mut self, fields: &[&str], sanitize: impl Fn(&str, &str) -> String) {
        for &field in fields {
            let Some(value) = self.0.get(field) else {
                continue;
            };
            if value.as_str().map_or(true, str::is_empty) {
                continue;
            }
            let cleaned = map_text(value, |text| sanitize(text, field));
            self.0.insert(field.to_string(), cleaned);
        }
    }
}

impl From<Map<String, Value>> for FormData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Checks a form the way the check-in page does before submitting.
///
/// Returns the error messages in a fixed order (name, personal ID, phone,
/// tag); an empty list means the form is valid.
pub fn validate_form(data: &FormData) -> Vec<String> {
    let mut errors = Vec::new();

    let name = data.first_text(NAME_FIELDS).trim();
    if name.is_empty() {
        errors.push("Name is required".to_string());
    } else if name.chars().count() > NAME_MAX_LEN {
        errors.push(format!("Name can be max {NAME_MAX_LEN} characters"));
    }

    let id = data.first_text(ID_FIELDS);
    if !id.is_empty() {
        let digits = sanitize_id(id).len();
        if digits > 0 && !ID_DIGIT_COUNTS.contains(&digits) {
            errors.push(format!("Personal ID must be 10 or 12 digits (got {digits})"));
        }
    }

    let phone = data.first_text(PHONE_FIELDS);
    if !phone.is_empty() {
        let digits = sanitize_phone(phone).len();
        if digits > 0 && digits < PHONE_MIN_DIGITS {
            errors.push(format!(
                "Phone number too short (minimum {PHONE_MIN_DIGITS} digits)"
            ));
        }
    }

    let tag = data.first_text(TAG_FIELDS);
    if tag.trim().chars().count() > TAG_MAX_LEN {
        errors.push(format!("Tag can be max {TAG_MAX_LEN} characters"));
    }

    errors
}

/// Returns a sanitized copy of `data`; unknown fields are left as they are.
pub fn sanitize_form_data(data: &FormData) -> FormData {
    let mut result = data.clone();
    result.apply(STRING_FIELDS, sanitize_string);
    result.apply(PHONE_FIELDS, |value, _| sanitize_phone(value));
    result.apply(ID_FIELDS, |value, _| sanitize_id(value));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn form(value: Value) -> FormData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_form_requires_name() {
        assert_eq!(validate_form(&FormData::new()), vec!["Name is required"]);
    }

    #[test]
    fn whitespace_name_is_missing() {
        let errors = validate_form(&form(json!({ "name": "   " })));
        assert_eq!(errors, vec!["Name is required"]);
    }

    #[test]
    fn long_name_is_rejected() {
        let errors = validate_form(&form(json!({ "name": "A".repeat(200) })));
        assert_eq!(errors, vec!["Name can be max 100 characters"]);
    }

    #[test]
    fn personal_id_needs_ten_or_twelve_digits() {
        let errors = validate_form(&form(json!({ "name": "Viktor", "personal_id": "12345" })));
        assert_eq!(errors, vec!["Personal ID must be 10 or 12 digits (got 5)"]);

        for ok in ["900101-1234", "19900101-1234"] {
            let errors = validate_form(&form(json!({ "name": "Viktor", "personnummer": ok })));
            assert!(errors.is_empty(), "{ok}: {errors:?}");
        }
    }

    #[test]
    fn id_without_digits_is_not_checked() {
        let errors = validate_form(&form(json!({ "name": "Viktor", "personal_id": "--" })));
        assert!(errors.is_empty());
    }

    #[test]
    fn short_phone_is_rejected() {
        let errors = validate_form(&form(json!({ "name": "Viktor", "telefon": "070-12" })));
        assert_eq!(errors, vec!["Phone number too short (minimum 7 digits)"]);

        let errors = validate_form(&form(json!({ "name": "Viktor", "phone": "070-123 45 67" })));
        assert!(errors.is_empty());
    }

    #[test]
    fn long_tag_is_rejected() {
        let errors = validate_form(&form(json!({ "name": "Viktor", "nick": "x".repeat(31) })));
        assert_eq!(errors, vec!["Tag can be max 30 characters"]);
    }

    #[test]
    fn localized_field_wins_when_present() {
        let data = form(json!({ "namn": "", "name": "Viktor", "personnummer": "19900101-1234", "personal_id": "1" }));
        assert!(validate_form(&data).is_empty());
    }

    #[test]
    fn errors_come_out_in_rule_order() {
        let data = form(json!({
            "tag": "t".repeat(40),
            "phone": "12",
            "personal_id": "123",
        }));
        let expected = vec![
            "Name is required",
            "Personal ID must be 10 or 12 digits (got 3)",
            "Phone number too short (minimum 7 digits)",
            "Tag can be max 30 characters",
        ];
        assert_eq!(validate_form(&data), expected);
        assert_eq!(validate_form(&data), expected);
    }

    #[test]
    fn non_string_values_count_as_absent() {
        let data = form(json!({ "name": 17, "phone": ["070"], "personal_id": null }));
        assert_eq!(validate_form(&data), vec!["Name is required"]);
    }

    #[test]
    fn sanitize_cleans_known_fields() {
        let data = form(json!({
            "namn": "  Viktor  ",
            "telefon": "070-123 45 67",
            "personal_id": "19900101-1234",
            "email": " v@example.se ",
            "tag": "x".repeat(40),
            "comment": "  keep me  ",
        }));

        let cleaned = sanitize_form_data(&data);

        assert_eq!(
            cleaned,
            form(json!({
                "namn": "Viktor",
                "telefon": "0701234567",
                "personal_id": "199001011234",
                "email": "v@example.se",
                "tag": "x".repeat(30),
                "comment": "  keep me  ",
            }))
        );
    }

    #[test]
    fn sanitize_leaves_input_untouched() {
        let data = form(json!({ "name": "  Viktor  ", "phone": 7012345, "nick": "" }));
        let before = data.clone();

        let cleaned = sanitize_form_data(&data);

        assert_eq!(data, before);
        assert_eq!(cleaned.text("name"), Some("Viktor"));
        assert_eq!(cleaned.get("phone"), Some(&json!(7012345)));
        assert_eq!(cleaned.text("nick"), Some(""));
    }
}
