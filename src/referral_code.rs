//! Referral-code generation.
//!
//! Codes look like `JOH1234`: up to three alphabetic characters taken from
//! the influencer's name, plus the last four digits of a millisecond clock.
//! The functions here are pure; global uniqueness is the caller's
//! responsibility (`InfluencerDirectory::create` runs a capped check-and-retry
//! loop against the database).

/// Prefix used when a name contains no alphabetic characters at all.
const FALLBACK_PREFIX: &str = "REF";

/// Builds the base code for a name from a millisecond timestamp.
///
/// Takes up to the first 3 ASCII-alphabetic characters of `name` (uppercased,
/// whitespace and punctuation skipped) and appends the last four digits of
/// `millis`, zero-padded.
pub fn base_code(name: &str, millis: i64) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();

    let prefix = if prefix.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        prefix
    };

    format!("{}{:04}", prefix, millis.rem_euclid(10_000))
}

/// Appends the collision attempt number to a base code (`JOH1234` -> `JOH12341`).
pub fn with_suffix(base: &str, attempt: u32) -> String {
    format!("{}{}", base, attempt)
}
