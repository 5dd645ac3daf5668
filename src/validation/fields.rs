/// Maximum accepted length (in characters) for known form fields.
/// Lookups are case-insensitive; unknown fields have no limit.
const MAX_LENGTHS: &[(&str, usize)] = &[
    ("namn", 100),
    ("name", 100),
    ("telefon", 20),
    ("phone", 20),
    ("personnummer", 12),
    ("personal_id", 12),
    ("tag", 30),
    ("nick", 30),
    ("email", 254), // RFC 5321
    ("discord", 50),
];

pub const NAME_MAX_LEN: usize = 100;
pub const TAG_MAX_LEN: usize = 30;
pub const PHONE_MIN_DIGITS: usize = 7;
pub const ID_DIGIT_COUNTS: [usize; 2] = [10, 12];

/// Field names for one logical field, localized (Swedish) spelling first.
pub const NAME_FIELDS: &[&str] = &["namn", "name"];
pub const PHONE_FIELDS: &[&str] = &["telefon", "phone"];
pub const ID_FIELDS: &[&str] = &["personnummer", "personal_id"];
pub const TAG_FIELDS: &[&str] = &["tag", "nick"];

/// Fields run through the plain string sanitizer.
pub const STRING_FIELDS: &[&str] = &["namn", "name", "tag", "nick", "email", "discord"];

/// The server also accepts `telephone` (used by the registration form).
pub const SERVER_PHONE_FIELDS: &[&str] = &["telefon", "phone", "telephone"];

pub const MISSING_FIELD: &str = "missing";
pub const LEGACY_MISSING_FIELD: &str = "saknas";

pub fn max_length(field: &str) -> Option<usize> {
    let field = field.to_lowercase();
    MAX_LENGTHS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, max)| *max)
}

/// Canonical key for an outstanding check-in requirement, if the alias is known.
pub fn canonical_missing_key(key: &str) -> Option<&'static str> {
    match key {
        "startgg" | "start.gg" => Some("startgg"),
        "membership" | "medlemskap" | "member" => Some("membership"),
        "payment" | "betalning" | "swish" => Some("payment"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_length_ignores_case() {
        assert_eq!(max_length("NAME"), Some(100));
        assert_eq!(max_length("Discord"), Some(50));
        assert_eq!(max_length("favourite_colour"), None);
    }

    #[test]
    fn swedish_aliases_map_to_english_keys() {
        assert_eq!(canonical_missing_key("medlemskap"), Some("membership"));
        assert_eq!(canonical_missing_key("betalning"), Some("payment"));
        assert_eq!(canonical_missing_key("start.gg"), Some("startgg"));
        assert_eq!(canonical_missing_key("locker"), None);
    }
}
