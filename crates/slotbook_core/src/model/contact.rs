//! Contact normalization and matching.
//!
//! # Invariants
//! - Normalized contacts contain only ASCII digits, optionally preceded by one
//!   leading `+`.
//! - An empty contact never matches anything, including another empty contact.

/// Normalizes a phone/WhatsApp identifier.
///
/// Keeps ASCII digits and a `+` only when it precedes every kept digit.
/// `" +90 (555) 010-20 "` becomes `"+9055501020"`.
pub fn normalize_contact(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            normalized.push(ch);
        } else if ch == '+' && normalized.is_empty() {
            normalized.push(ch);
        }
    }
    normalized
}

/// Whether a raw contact is usable for booking: non-empty after
/// normalization and carrying at least one digit.
pub fn is_valid_contact(raw: &str) -> bool {
    normalize_contact(raw).chars().any(|ch| ch.is_ascii_digit())
}

/// Exact comparison of normalized forms; empty on either side never matches.
pub fn contacts_match(stored: &str, claimed: &str) -> bool {
    let stored = normalize_contact(stored);
    let claimed = normalize_contact(claimed);
    !stored.is_empty() && !claimed.is_empty() && stored == claimed
}
