//! Log Redaction Layer
//!
//! Scrubs API keys and access tokens from strings, and phone numbers from log lines.

use once_cell::sync::Lazy;
use regex::Regex;

static TELEPHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(AIza[0-9A-Za-z\-_]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)")
        .unwrap()
});
static KEY_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([?&]key=)[^&\s]+").unwrap());

/// Scrubs API keys, bearer tokens, and `key=` query parameters.
///
/// Digit runs are left alone, so this is the variant for text that goes back
/// to API callers (timestamps and byte counts stay readable).
pub fn redact_secrets(input: &str) -> String {
    let redacted = KEY_PARAM_RE.replace_all(input, "${1}[REDACTED_TOKEN]");
    API_KEY_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}

/// Redacts sensitive patterns in a string, phone numbers included. For log lines.
pub fn redact_sensitive_data(input: &str) -> String {
    // Phone numbers last so digit runs inside tokens are already gone.
    TELEPHONE_RE
        .replace_all(&redact_secrets(input), "[REDACTED_PHONE]")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    }

    #[test]
    fn test_query_key_redaction() {
        let raw = "POST https://generativelanguage.googleapis.com/v1beta/models/x?key=abc123&alt=json";
        let clean = redact_sensitive_data(raw);
        assert_eq!(
            clean,
            "POST https://generativelanguage.googleapis.com/v1beta/models/x?key=[REDACTED_TOKEN]&alt=json"
        );
    }

    #[test]
    fn test_secrets_keep_digit_runs() {
        let raw = "quota reset at 1696509045 after 2147483648 bytes, Bearer abc.def";
        let clean = redact_secrets(raw);
        assert_eq!(
            clean,
            "quota reset at 1696509045 after 2147483648 bytes, [REDACTED_TOKEN]"
        );
        assert!(redact_sensitive_data(raw).contains("[REDACTED_PHONE]"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let raw = "OCR processing failed: upstream timeout";
        assert_eq!(redact_sensitive_data(raw), raw);
    }
}
