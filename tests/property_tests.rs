/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs to the referral-code
/// generator and the submission validators.
use proptest::prelude::*;
use referral_intake_api::attribution::{flatten_list, is_valid_email, validate_in_phone};
use referral_intake_api::referral_code::{base_code, with_suffix};

// Property: code generation should never panic and always produce the
// documented shape (1-3 uppercase letters, then digits)
proptest! {
    #[test]
    fn base_code_never_panics(name in "\\PC*", millis in proptest::num::i64::ANY) {
        let _ = base_code(&name, millis);
    }

    #[test]
    fn base_code_matches_documented_shape(name in "[a-zA-Z][a-zA-Z ]{0,30}", millis in 0i64..=i64::MAX) {
        let code = base_code(&name, millis);

        let prefix: String = code.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let digits: String = code.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();

        prop_assert!(!prefix.is_empty() && prefix.len() <= 3, "prefix out of range: {}", code);
        prop_assert!(prefix.chars().all(|c| c.is_ascii_uppercase()), "prefix not uppercased: {}", code);
        prop_assert_eq!(digits.len(), 4, "expected 4 time digits: {}", code);
        prop_assert!(digits.chars().all(|c| c.is_ascii_digit()), "suffix not numeric: {}", code);
    }

    #[test]
    fn base_code_prefix_comes_from_name(name in "[a-z]{3,15}", millis in 0i64..=i64::MAX) {
        let code = base_code(&name, millis);
        prop_assert!(code.starts_with(&name[..3].to_uppercase()));
    }

    #[test]
    fn suffixed_codes_never_collide_with_base(name in "[a-zA-Z]{1,10}", millis in 0i64..=i64::MAX, attempt in 1u32..1000) {
        let base = base_code(&name, millis);
        let suffixed = with_suffix(&base, attempt);
        prop_assert_ne!(&suffixed, &base);
        prop_assert!(suffixed.starts_with(&base));
    }

    #[test]
    fn distinct_attempts_give_distinct_codes(name in "[a-zA-Z]{1,10}", millis in 0i64..=i64::MAX, a in 1u32..500, b in 501u32..1000) {
        let base = base_code(&name, millis);
        prop_assert_ne!(with_suffix(&base, a), with_suffix(&base, b));
    }
}

// Property: validators should never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn phone_validation_never_panics(phone in "\\PC*") {
        let _ = validate_in_phone(&phone);
    }

    #[test]
    fn valid_in_phones_normalize_to_e164(number in 6_000_000_000u64..=9_999_999_999u64) {
        let phone = number.to_string();
        let (valid, normalized) = validate_in_phone(&phone);
        if valid {
            // Valid phones should start with +91
            prop_assert!(normalized.starts_with("+91"));
            // Should contain only digits after +
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
            // +91 plus the 10 subscriber digits
            prop_assert_eq!(normalized.len(), 13);
        }
    }

    #[test]
    fn very_short_phones_always_invalid(phone in "[0-9]{0,7}") {
        let (valid, _) = validate_in_phone(&phone);
        prop_assert!(!valid, "Very short phone should be invalid: {}", phone);
    }
}

// Property: list flattening preserves non-blank entries in order
proptest! {
    #[test]
    fn flatten_list_preserves_nonblank_entries(entries in proptest::collection::vec("[a-zA-Z]{1,10}", 1..10)) {
        let flattened = flatten_list(Some(entries.clone())).expect("non-empty input");
        let values: Vec<String> = flattened
            .as_array()
            .expect("flattened to an array")
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect();
        prop_assert_eq!(values, entries);
    }

    #[test]
    fn flatten_list_never_keeps_blanks(entries in proptest::collection::vec("[ \\t]{0,5}", 0..10)) {
        prop_assert_eq!(flatten_list(Some(entries)), None);
    }
}
