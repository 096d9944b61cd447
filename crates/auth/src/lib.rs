//! # Quill authentication core
//!
//! Password credentials, device identity and per-device session tokens.
//!
//! - [`credentials`]: Argon2 hashing with a per-call random salt
//! - [`policy`]: pluggable password acceptance rules
//! - [`device`]: user-agent to device label resolution
//! - [`token`]: HS256-signed session tokens
//! - [`manager`]: the session state machine and the handler-facing boundary
//! - [`repository`]: persistence contracts, with in-memory versions in [`memory`]

pub mod credentials;
pub mod device;
pub mod entities;
pub mod error;
pub mod manager;
pub mod memory;
pub mod policy;
pub mod repository;
pub mod token;
pub mod validation;

pub use credentials::{CredentialStore, HashedCredential};
pub use device::{DeviceResolver, UNKNOWN_DEVICE};
pub use entities::{NewUser, SessionState, User, UserAuth, UserRole, UserSettings};
pub use error::{AuthError, AuthResult, RepositoryError};
pub use manager::{
    IssuedSession, SessionManager, SessionPolicy, SessionSummary, MAX_SESSION_TTL_SECONDS,
};
pub use policy::{DefaultPasswordPolicy, PasswordPolicy};
pub use repository::{AuthRepository, RepositoryResult, UserRepository};
pub use token::{Claims, TokenSigner, MIN_SECRET_BYTES};
