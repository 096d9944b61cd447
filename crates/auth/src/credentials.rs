//! Password hashing and verification.

use argon2::password_hash::{rand_core::OsRng, Output, PasswordHasher, Salt, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;

use crate::error::{AuthError, AuthResult};

/// Upper bound on accepted plaintext length, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 256;

/// Storage-safe form of a password: the Argon2 output and its salt, both B64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCredential {
    pub encrypted_password: String,
    pub salt: String,
}

static TIMING_DUMMY: Lazy<Option<HashedCredential>> =
    Lazy::new(|| CredentialStore::default().hash("quill-timing-equaliser").ok());

#[derive(Clone, Default)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
}

impl CredentialStore {
    /// Hash `plaintext` under a freshly generated random salt.
    pub fn hash(&self, plaintext: &str) -> AuthResult<HashedCredential> {
        if plaintext.is_empty() {
            return Err(AuthError::Credential("password must not be empty".to_string()));
        }
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Credential(format!(
                "password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(AuthError::internal("credential.hash"))?;
        let output = hash.hash.ok_or_else(|| AuthError::Internal {
            op: "credential.hash",
            detail: "argon2 produced no output".to_string(),
        })?;

        Ok(HashedCredential {
            encrypted_password: output.to_string(),
            salt: salt.as_str().to_owned(),
        })
    }

    /// Recompute the hash under the stored salt and compare in constant time.
    ///
    /// A stored credential that cannot be decoded never verifies.
    pub fn verify(&self, plaintext: &str, encrypted_password: &str, salt: &str) -> bool {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }

        let Ok(expected) = Output::b64_decode(encrypted_password) else {
            return false;
        };
        let Ok(salt) = Salt::from_b64(salt) else {
            return false;
        };

        match self.argon2.hash_password(plaintext.as_bytes(), salt) {
            // `Output` equality is constant-time.
            Ok(candidate) => candidate.hash.map_or(false, |output| output == expected),
            Err(_) => false,
        }
    }

    /// Burn one verification against a fixed credential so unknown accounts
    /// take as long to reject as wrong passwords.
    pub fn verify_dummy(&self, plaintext: &str) {
        if let Some(dummy) = TIMING_DUMMY.as_ref() {
            let _ = self.verify(plaintext, &dummy.encrypted_password, &dummy.salt);
        }
    }
}
