//! User identifier validation.

/// Valid `user_id` grammar: ASCII letters, digits, `-`, `_`; length 1-128.
pub fn validate_user_id(user_id: &str) -> bool {
    let len = user_id.len();
    (1..=128).contains(&len)
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_letters_digits_dash_underscore() {
        assert!(validate_user_id("alice"));
        assert!(validate_user_id("bob-2"));
        assert!(validate_user_id("u_1"));
        assert!(validate_user_id(&"a".repeat(128)));
    }

    #[test]
    fn rejects_empty_too_long_and_bad_characters() {
        assert!(!validate_user_id(""));
        assert!(!validate_user_id(&"a".repeat(129)));
        assert!(!validate_user_id("alice smith"));
        assert!(!validate_user_id("alice@example"));
        assert!(!validate_user_id("alice/bob"));
    }
}
