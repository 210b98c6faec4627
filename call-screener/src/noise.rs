//! Noise filtering for harvested screen text.
//!
//! Harvested text includes a lot of structural chrome: call buttons, the
//! caller's number, and while our own app is visible, our own labels. None of
//! it says anything about who is calling, so it never reaches the decision
//! engine.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

/// Our own UI strings, discarded when contained anywhere in the text
pub const OWN_UI_FRAGMENTS: &[&str] = &[
    "spam blocker",
    "dnd access",
    "do not disturb",
    "accessibility service",
    "blocked keywords",
    "add keyword",
];

/// Our own UI strings, discarded on exact match only
pub const OWN_UI_LABELS: &[&str] = &[
    "test blocking functionality",
    "grant dnd access",
    "view blocked numbers",
];

/// Generic in-call control labels
pub const CALL_CONTROL_LABELS: &[&str] = &[
    "calling",
    "incoming call",
    "answer",
    "decline",
    "reject",
    "accept",
    "end call",
    "mute",
    "speaker",
    "add call",
    "hold",
    "keypad",
    "contacts",
    "message",
    "call",
];

lazy_static! {
    static ref DIGITS_ONLY: Regex = Regex::new(r"^\d+$").unwrap();

    // Digits with the punctuation dialers use to format numbers
    static ref PHONE_SHAPED: Regex = Regex::new(r"^[+\-\d\s()]+$").unwrap();
}

/// Purely numeric or formatted like a phone number
pub fn is_phone_shaped(text: &str) -> bool {
    let text = text.trim();
    DIGITS_ONLY.is_match(text) || PHONE_SHAPED.is_match(text)
}

/// One of the generic call-control labels, ignoring case
pub fn is_call_control_label(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    CALL_CONTROL_LABELS.contains(&lower.as_str())
}

/// Text coming from our own screens
pub fn is_own_ui_text(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    OWN_UI_LABELS.contains(&lower.as_str())
        || OWN_UI_FRAGMENTS
            .iter()
            .any(|fragment| lower.contains(fragment))
}

/// Whether `text` is UI chrome rather than caller information
pub fn is_noise_text(text: &str) -> bool {
    let trimmed = text.trim();

    let noise = trimmed.chars().count() < 2
        || is_own_ui_text(trimmed)
        || is_phone_shaped(trimmed)
        || is_call_control_label(trimmed);

    if noise {
        trace!("Discarding noise text '{}'", trimmed);
    }
    noise
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_and_empty_text_is_noise() {
        assert!(is_noise_text(""));
        assert!(is_noise_text("   "));
        assert!(is_noise_text("a"));
        assert!(is_noise_text(" x "));
        assert!(!is_noise_text("Al"));
    }

    #[test]
    fn test_numbers_are_noise() {
        assert!(is_noise_text("12345"));
        assert!(is_noise_text("+1 (555) 123-4567"));
        assert!(is_noise_text("555-0100"));
        assert!(!is_noise_text("Call 555 now"));
    }

    #[test]
    fn test_call_controls_are_noise() {
        for label in CALL_CONTROL_LABELS {
            assert!(is_noise_text(label), "{} should be noise", label);
        }
        assert!(is_noise_text("Decline"));
        assert!(is_noise_text("  END CALL "));
        assert!(!is_noise_text("Callcenter Promo"));
    }

    #[test]
    fn test_own_ui_is_noise() {
        assert!(is_noise_text("Spam Blocker"));
        assert!(is_noise_text("Spam Blocker is running"));
        assert!(is_noise_text("Grant DND Access"));
        assert!(is_noise_text("Enable the accessibility service"));
        assert!(is_noise_text("Blocked Keywords (3)"));
        assert!(is_noise_text("View blocked numbers"));
        assert!(!is_noise_text("View blocked numbers here"));
    }

    #[test]
    fn test_caller_information_passes() {
        assert!(!is_noise_text("SPAM LIKELY"));
        assert!(!is_noise_text("ACME Telemarketer Inc"));
        assert!(!is_noise_text("John Smith"));
    }

    proptest! {
        #[test]
        fn prop_formatted_numbers_are_noise(number in "\\+?[0-9]{1,3}[ -]?\\(?[0-9]{3}\\)?[ -]?[0-9]{3}-?[0-9]{4}") {
            prop_assert!(is_noise_text(&number));
        }
    }
}
