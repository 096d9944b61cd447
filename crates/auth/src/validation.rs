//! Sign-up input validation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AuthError, AuthResult};

const MAX_EMAIL_BYTES: usize = 255;
const MAX_NAME_CHARS: usize = 100;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Lowercase and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.len() > MAX_EMAIL_BYTES {
        return Err(AuthError::Validation("email is too long".to_string()));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(AuthError::Validation("email format is invalid".to_string()));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> AuthResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AuthError::Validation("name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(AuthError::Validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    if trimmed.chars().any(|c| matches!(c, '\n' | '\r' | '\t' | '\0')) {
        return Err(AuthError::Validation(
            "name contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
