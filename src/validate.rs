//! Shared syntactic validators for caller-supplied fields.

use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]+$").expect("static regex"));

static MAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

/// True iff `s` is a valid account/user/group name: lowercase first
/// character, at least two characters, body restricted to lowercase
/// letters, digits, `_` and `-`.
pub fn validate_name(s: &str) -> bool {
    NAME_RE.is_match(s)
}

/// True iff `s` looks like a plausible email address: exactly one `@`,
/// a dotted domain part, no whitespace anywhere.
pub fn validate_mail(s: &str) -> bool {
    MAIL_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts() {
        assert!(validate_name("ab1"));
        assert!(validate_name("a_b-2"));
        assert!(validate_name("project-x_01"));
    }

    #[test]
    fn test_validate_name_rejects() {
        assert!(!validate_name("A"));
        assert!(!validate_name("1abc"));
        assert!(!validate_name("a")); // too short
        assert!(!validate_name("a b"));
        assert!(!validate_name(""));
        assert!(!validate_name("Abc"));
    }

    #[test]
    fn test_validate_mail_accepts() {
        assert!(validate_mail("a@b.com"));
        assert!(validate_mail("first.last@sub.example.org"));
    }

    #[test]
    fn test_validate_mail_rejects() {
        assert!(!validate_mail("a@b"));
        assert!(!validate_mail("a b@c.com"));
        assert!(!validate_mail("@b.com"));
        assert!(!validate_mail("a@b@c.com"));
        assert!(!validate_mail(""));
    }
}
