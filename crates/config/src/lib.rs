use std::fmt;
use std::path::PathBuf;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "quill.toml",
    "config/quill.toml",
    "crates/config/quill.toml",
    "../quill.toml",
    "../config/quill.toml",
];

/// Shortest accepted HMAC signing secret, in bytes.
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

const THIRTY_DAYS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted session lifetime: one hundred years. Keeps every stored
/// expiry inside four-digit RFC3339 years.
pub const MAX_SESSION_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://quill.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// HMAC key for session tokens. Generated per process when unset.
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default = "AuthConfig::default_issuer")]
    pub token_issuer: String,
    #[serde(default = "AuthConfig::default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default)]
    pub cookie: CookieConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            signing_secret: None,
            token_issuer: Self::default_issuer(),
            password_min_length: Self::default_password_min_length(),
            cookie: CookieConfig::default(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        THIRTY_DAYS
    }

    fn default_issuer() -> String {
        "quill".to_string()
    }

    const fn default_password_min_length() -> usize {
        8
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.session_ttl_seconds > 0,
            "auth.session_ttl_seconds must be positive"
        );
        ensure!(
            self.session_ttl_seconds <= MAX_SESSION_TTL_SECONDS,
            "auth.session_ttl_seconds must not exceed {MAX_SESSION_TTL_SECONDS}"
        );
        ensure!(
            !self.token_issuer.trim().is_empty(),
            "auth.token_issuer must not be empty"
        );
        if let Some(secret) = &self.signing_secret {
            ensure!(
                secret.len() >= MIN_SIGNING_SECRET_BYTES,
                "auth.signing_secret must be at least {MIN_SIGNING_SECRET_BYTES} bytes"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("token_issuer", &self.token_issuer)
            .field("password_min_length", &self.password_min_length)
            .field("cookie", &self.cookie)
            .finish()
    }
}

/// Attributes of the session cookie.
///
/// ```
/// use quill_config::{CookieConfig, SameSitePolicy};
///
/// let cookie = CookieConfig::default();
/// assert_eq!(cookie.name, "quill_session");
/// assert!(cookie.secure);
/// assert_eq!(cookie.same_site, SameSitePolicy::Lax);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "CookieConfig::default_name")]
    pub name: String,
    #[serde(default = "CookieConfig::default_secure")]
    pub secure: bool,
    #[serde(default = "CookieConfig::default_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub same_site: SameSitePolicy,
}

impl CookieConfig {
    fn default_name() -> String {
        "quill_session".to_string()
    }

    const fn default_secure() -> bool {
        true
    }

    fn default_path() -> String {
        "/".to_string()
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            secure: Self::default_secure(),
            path: Self::default_path(),
            domain: None,
            same_site: SameSitePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    Lax,
    Strict,
    None,
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use quill_config::load;
///
/// std::env::remove_var("QUILL_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();
    let auth = &defaults.auth;

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "auth.session_ttl_seconds",
            i64::try_from(auth.session_ttl_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("auth.token_issuer", auth.token_issuer.clone())?
        .set_default(
            "auth.password_min_length",
            i64::try_from(auth.password_min_length).unwrap_or(i64::MAX),
        )?
        .set_default("auth.cookie.name", auth.cookie.name.clone())?
        .set_default("auth.cookie.secure", auth.cookie.secure)?
        .set_default("auth.cookie.path", auth.cookie.path.clone())?
        .set_default("auth.cookie.same_site", "lax")?;

    let environment_overrides = config::Environment::with_prefix("QUILL").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("QUILL_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via QUILL_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
        config.auth.session_ttl_seconds = MAX_SESSION_TTL_SECONDS;
    }

    config.auth.validate().context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
