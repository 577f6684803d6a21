//! Identity normalization and validation shared by merge and the source adapters.
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

/// Free mail providers. Addresses on these domains say nothing about an employer.
pub const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
];

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

/// Trims and lowercases an email. Returns `None` for blank input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

/// Validate email address
///
/// Checks for:
/// - Minimum length and a dotted domain
/// - Placeholder patterns (long runs of repeated digits)
/// - Simplified RFC 5322 shape
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    if let Some(pattern) = fake_patterns.iter().find(|p| email.contains(**p)) {
        tracing::debug!("Rejecting email with placeholder pattern '{}': {}", pattern, email);
        return false;
    }

    email_regex().is_match(email)
}

/// Domain part of a normalized email.
pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, d)| d).filter(|d| !d.is_empty())
}

pub fn is_free_mail_domain(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&domain)
}

/// Normalize a phone number to E.164.
///
/// Numbers with a leading `+` are parsed as international; anything else is
/// tried as a US number. Invalid numbers yield `None`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 7 {
        return None;
    }

    let region = if trimmed.starts_with('+') {
        None
    } else {
        Some(CountryId::US)
    };

    match phonenumber::parse(region, trimmed) {
        Ok(number) if phonenumber::is_valid(&number) => {
            Some(number.format().mode(Mode::E164).to_string())
        }
        Ok(_) => {
            tracing::debug!("Discarding invalid phone number: {}", trimmed);
            None
        }
        Err(e) => {
            tracing::debug!("Failed to parse phone '{}': {:?}", trimmed, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@ACME.com "),
            Some("alice@acme.com".to_string())
        );
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("alice@acme.com"));
        assert!(is_valid_email("first.last+tag@example.co.uk"));
        assert!(!is_valid_email("alice@acme"));
        assert!(!is_valid_email("alice acme.com"));
        assert!(!is_valid_email("@acme.com"));
        assert!(!is_valid_email("11999999999@gmail.com"));
    }

    #[test]
    fn test_free_mail() {
        assert!(is_free_mail_domain("gmail.com"));
        assert!(!is_free_mail_domain("acme.com"));
        assert_eq!(email_domain("bob@example.com"), Some("example.com"));
        assert_eq!(email_domain("bob@"), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("+1 415-555-2671"),
            Some("+14155552671".to_string())
        );
        assert_eq!(normalize_phone("(415) 555-2671"), Some("+14155552671".to_string()));
        assert_eq!(normalize_phone("123"), None);
    }
}
