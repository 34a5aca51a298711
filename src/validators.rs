/// Request input validators
///
/// Length limits guard against oversized payloads; the email regex is a
/// practical RFC 5322 subset. Everything that passes here is still bound
/// as a query parameter, never interpolated into SQL.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validates and normalizes an email address.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }
    // Local part over 64 characters is a phishing indicator
    if trimmed.find('@').map(|at| at > 64).unwrap_or(false) {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates a display name or company name.
pub fn is_valid_name(field: &'static str, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_NAME_LENGTH));
    }
    if trimmed.contains('\0') || trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(format!(
            "{} contains invalid characters",
            field
        )));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_trimmed() {
        assert_eq!(
            is_valid_email("  user@example.com  ").unwrap(),
            "user@example.com"
        );
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());
        assert!(is_valid_email("a@b").is_err()); // too short
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("name", "John Doe").is_ok());
        assert!(is_valid_name("name", "Jean-Pierre").is_ok());
        assert!(is_valid_name("company_name", "O'Brien & Sons").is_ok());
    }

    #[test]
    fn test_name_length_limits() {
        assert!(is_valid_name("name", &"a".repeat(257)).is_err());
        assert!(is_valid_name("name", "").is_err());
        assert!(is_valid_name("name", "   ").is_err());
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(is_valid_name("name", "Name\0with\0null").is_err());
        assert!(is_valid_name("name", "line\nbreak").is_err());
    }
}
