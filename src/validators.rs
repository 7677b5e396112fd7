/// Input validators
///
/// Every request body is parsed into `Option` fields first and then pushed
/// through these functions, which trim, normalise and bound the values
/// before they reach a service.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_REASON_LENGTH: usize = 1000;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("email regex is valid");
}

/// Require an optional field to be present.
pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

/// Validates and normalises an email address.
///
/// Emails are identities: they are trimmed and lowercased so that lookups
/// are case-insensitive.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Lowercased, trimmed form used for lookups where no format check is wanted
/// (login and forgot-password must not reveal anything through 400s).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a person's first or last name.
pub fn is_valid_name(name: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Optional name: absent or blank becomes `None`.
pub fn optional_name(name: &Option<String>, field: &str) -> Result<Option<String>, ValidationError> {
    match name.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) => is_valid_name(n, field).map(Some),
    }
}

/// Raw password bounds, checked before hashing.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    // bcrypt only looks at the first 72 bytes; the upper bound keeps hashing cheap
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    Ok(())
}

/// Moderation rejection reason.
pub fn is_valid_reason(reason: &Option<String>) -> Result<String, ValidationError> {
    let trimmed = required(reason, "reason")?.trim();

    if trimmed.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong("reason".to_string(), MAX_REASON_LENGTH));
    }

    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent("reason".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Free text field (titles, descriptions, address lines) with a length cap.
pub fn is_valid_text(value: &str, field: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong(field.to_string(), max));
    }

    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = name
        .chars()
        .filter(|c| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '-' | '.' | '_' | '\'')
        })
        .count();

    special_char_count > 5
}
