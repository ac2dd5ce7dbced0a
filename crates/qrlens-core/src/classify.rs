//! Coarse payload classification.
//!
//! This is heuristic labelling, not validation: a string that starts with
//! `http` is a URL even if it does not parse as one.

use crate::types::PayloadKind;

/// Classify decoded text. Rules are checked in order; first match wins.
pub fn classify(content: &str) -> PayloadKind {
    if content.starts_with("http") {
        PayloadKind::Url
    } else if content.contains('@') {
        PayloadKind::Email
    } else if looks_like_phone(content) {
        PayloadKind::Phone
    } else {
        PayloadKind::Text
    }
}

/// Optional leading `+` then one or more ASCII digits, ignoring all whitespace.
fn looks_like_phone(content: &str) -> bool {
    let mut chars = content.chars().filter(|c| !c.is_whitespace()).peekable();
    if chars.peek() == Some(&'+') {
        chars.next();
    }
    let mut digits = 0usize;
    for c in chars {
        if !c.is_ascii_digit() {
            return false;
        }
        digits += 1;
    }
    digits > 0
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_http_prefix_is_url(rest in ".*") {
            prop_assert_eq!(classify(&format!("http{rest}")), PayloadKind::Url);
        }

        #[test]
        fn test_at_sign_is_email(prefix in "[a-z ]{0,8}", suffix in ".{0,16}") {
            prop_assume!(!prefix.starts_with("http"));
            let s = format!("{prefix}@{suffix}");
            prop_assert_eq!(classify(&s), PayloadKind::Email);
        }

        #[test]
        fn test_digits_with_spaces_are_phone(plus in any::<bool>(), digits in "[0-9]{1,15}", pad in " {0,3}") {
            let spaced: String = digits.chars().flat_map(|c| [c, ' ']).collect();
            let s = format!("{pad}{}{spaced}", if plus { "+" } else { "" });
            prop_assert_eq!(classify(&s), PayloadKind::Phone);
        }

        #[test]
        fn test_classify_never_panics(s in any::<String>()) {
            let _ = classify(&s);
        }
    }
}
