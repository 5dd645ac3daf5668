//! Check-in form validation and sanitization.
//!
//! Every function here is total: invalid input yields error messages or is
//! passed through, never a panic.

pub mod fields;
pub mod form;
pub mod payload;
pub mod sanitize;

pub use form::{sanitize_form_data, validate_form, FormData};
pub use payload::{normalize_missing_keys, sanitize_checkin_payload, validate_checkin_payload};
pub use sanitize::{sanitize_id, sanitize_phone, sanitize_string};
