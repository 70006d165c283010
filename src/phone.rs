//! Free-form phone input canonicalization.
//!
//! Produces a single E.164-like representation (`+` followed by 8–16 digits)
//! or rejects the input. The digit-only heuristics assume Italian mobile
//! numbers as the default country — a deliberate limitation, not a bug.

/// Normalize raw phone input to `+<8–16 digits>`, or `None` if it cannot be
/// interpreted as a phone number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '-' | '(' | ')' | '.'))
        .collect();

    if let Some(rest) = s.strip_prefix("00") {
        s = format!("+{rest}");
    }

    if !s.starts_with('+') && !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        // Digit-only input: assume an Italian mobile when it looks like one.
        if s.len() == 10 && s.starts_with('3') {
            s = format!("+39{s}");
        } else if s.len() == 12 && s.starts_with("39") {
            s = format!("+{s}");
        } else {
            s = format!("+{s}");
        }
    }

    let digits = s.strip_prefix('+')?;
    if (8..=16).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(s)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mobile_gets_country_prefix() {
        assert_eq!(
            normalize_phone("333 123 4567").as_deref(),
            Some("+393331234567")
        );
    }

    #[test]
    fn already_prefixed_number_keeps_prefix() {
        assert_eq!(
            normalize_phone("+39 333 1234567").as_deref(),
            Some("+393331234567")
        );
    }

    #[test]
    fn twelve_digits_starting_39_gets_plus() {
        assert_eq!(
            normalize_phone("393331234567").as_deref(),
            Some("+393331234567")
        );
    }

    #[test]
    fn double_zero_expands_to_plus() {
        assert_eq!(
            normalize_phone("0039 333 1234567").as_deref(),
            Some("+393331234567")
        );
    }

    #[test]
    fn separators_are_stripped() {
        assert_eq!(
            normalize_phone("(333) 123-45.67").as_deref(),
            Some("+393331234567")
        );
    }

    #[test]
    fn other_digit_runs_get_bare_plus() {
        assert_eq!(normalize_phone("4915112345678").as_deref(), Some("+4915112345678"));
    }

    #[test]
    fn rejects_letters() {
        assert_eq!(normalize_phone("abc"), None);
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("   "), None);
    }

    #[test]
    fn rejects_too_short_and_too_long() {
        assert_eq!(normalize_phone("+1234567"), None); // 7 digits
        assert_eq!(normalize_phone("+12345678901234567"), None); // 17 digits
    }

    #[test]
    fn rejects_plus_with_embedded_letters() {
        assert_eq!(normalize_phone("+39abc1234567"), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in ["333 123 4567", "+39 333 1234567", "0044 20 7946 0958"] {
            let once = normalize_phone(input).unwrap();
            assert_eq!(normalize_phone(&once).as_deref(), Some(once.as_str()));
        }
    }
}
