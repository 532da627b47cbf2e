//! Crisis keyword screening.
//!
//! Matching is plain case-insensitive substring containment with no word
//! boundaries, so "died down" trips the "die" keyword. False positives are
//! accepted in exchange for never missing a keyword.

/// Lowercase substrings that trigger the safety response.
pub const CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "self harm",
    "self-harm",
    "die",
    "hopeless",
    "no reason to live",
    "can't go on",
    "give up",
];

/// Static reply sent instead of an AI response when a keyword matches.
pub const CRISIS_RESPONSE: &str = "I'm really sorry you're feeling this way. You are not alone.\n\n\
📞 Kiran Mental Health Helpline (India): 1800-599-0019\n\
📞 AASRA: +91-9820466726\n\n\
Talking to someone trained can really help.";

/// Returns true if any crisis keyword occurs in `text`.
pub fn is_crisis_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CRISIS_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
