//! Password acceptance rules, applied before a plaintext ever reaches the credential store.

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_MIN_LENGTH: usize = 8;

const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>/?`~\\";

pub trait PasswordPolicy: Send + Sync {
    fn check(&self, candidate: &str) -> AuthResult<()>;
}

/// Any `Fn(&str) -> bool` can stand in as a policy.
impl<F> PasswordPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn check(&self, candidate: &str) -> AuthResult<()> {
        if self(candidate) {
            Ok(())
        } else {
            Err(AuthError::Credential(
                "password does not satisfy the password policy".to_string(),
            ))
        }
    }
}

/// Minimum length plus at least one uppercase letter, one digit and one symbol.
#[derive(Debug, Clone)]
pub struct DefaultPasswordPolicy {
    pub min_length: usize,
}

impl Default for DefaultPasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

impl DefaultPasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl PasswordPolicy for DefaultPasswordPolicy {
    fn check(&self, candidate: &str) -> AuthResult<()> {
        if candidate.chars().count() < self.min_length {
            return Err(AuthError::Credential(format!(
                "password must be at least {} characters long",
                self.min_length
            )));
        }
        if !candidate.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::Credential(
                "password must contain an uppercase letter".to_string(),
            ));
        }
        if !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::Credential(
                "password must contain a digit".to_string(),
            ));
        }
        if !candidate.chars().any(|c| SYMBOLS.contains(c)) {
            return Err(AuthError::Credential(
                "password must contain a symbol".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_accepts_strong_password() {
        let policy = DefaultPasswordPolicy::default();
        assert!(policy.check("Str0ngP@ss").is_ok());
    }

    #[test]
    fn default_policy_names_the_missing_class() {
        let policy = DefaultPasswordPolicy::default();

        let short = policy.check("S0@a").unwrap_err();
        assert!(short.to_string().contains("at least 8"));

        let no_upper = policy.check("str0ngp@ss").unwrap_err();
        assert!(no_upper.to_string().contains("uppercase"));

        let no_digit = policy.check("StrongP@ss").unwrap_err();
        assert!(no_digit.to_string().contains("digit"));

        let no_symbol = policy.check("Str0ngPass").unwrap_err();
        assert!(no_symbol.to_string().contains("symbol"));
    }

    #[test]
    fn closures_plug_in_as_policies() {
        let only_long = |candidate: &str| candidate.len() >= 20;
        assert!(only_long.check("short").is_err());
        assert!(only_long.check("a sufficiently long passphrase").is_ok());
    }

    #[test]
    fn min_length_counts_characters_not_bytes() {
        let policy = DefaultPasswordPolicy::new(4);
        assert!(policy.check("É1@").is_err());
        assert!(policy.check("É1@x").is_ok());
    }
}
