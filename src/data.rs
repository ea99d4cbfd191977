pub mod document;
pub mod student;

/// `[A-Za-z0-9]*` - the rule for identifier-like fields, applied per keystroke.
pub fn is_alphanumeric_field(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric())
}
