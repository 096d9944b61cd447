//! Signed session tokens.
//!
//! A token carries the session id and an expiry claim, never the user id. The
//! signing key is fixed when the signer is built and is read-only afterwards.

use chrono::{DateTime, TimeZone, Utc};
use cuid2::CuidConstructor;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Shortest signing secret the runtime accepts.
pub const MIN_SECRET_BYTES: usize = 32;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Session id.
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenSigner {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    pub fn sign(
        &self,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = Claims {
            sid: session_id.to_string(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::internal("token.sign"))
    }

    /// Check signature, issuer and expiry claim.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }
}

/// Fresh, collision-resistant session id.
pub fn generate_session_id() -> String {
    CUID.create_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test_secret_key_that_is_long_enough_for_hs256";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET, "quill-test")
    }

    #[test]
    fn sign_and_verify_carries_session_id() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.sign("sess_1", now, now + Duration::hours(1)).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sid, "sess_1");
        assert_eq!(claims.iss, "quill-test");
        assert_eq!(claims.exp, (now + Duration::hours(1)).timestamp());
    }

    #[test]
    fn past_expiry_claim_is_reported_as_expired() {
        let signer = signer();
        let now = Utc::now();
        let token = signer
            .sign("sess_1", now - Duration::hours(2), now - Duration::hours(1))
            .unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn foreign_key_or_issuer_is_invalid() {
        let now = Utc::now();
        let other_key = TokenSigner::new(b"another_secret_key_that_is_also_long_enough", "quill-test");
        let token = other_key.sign("sess_1", now, now + Duration::hours(1)).unwrap();
        assert!(matches!(signer().verify(&token), Err(AuthError::TokenInvalid)));

        let other_issuer = TokenSigner::new(SECRET, "someone-else");
        let token = other_issuer.sign("sess_1", now, now + Duration::hours(1)).unwrap();
        assert!(matches!(signer().verify(&token), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn malformed_token_is_invalid() {
        assert!(matches!(signer().verify("not.a.jwt"), Err(AuthError::TokenInvalid)));
        assert!(matches!(signer().verify(""), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.sign("sess_1", now, now + Duration::hours(1)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = signer.sign("sess_2", now, now + Duration::hours(1)).unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;

        assert!(matches!(signer.verify(&parts.join(".")), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn generated_session_ids_are_unique() {
        let first = generate_session_id();
        let second = generate_session_id();
        assert_ne!(first, second);
        assert!(!first.is_empty());
    }
}
