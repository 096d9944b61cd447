//! Domain records shared by the session manager and its repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account together with its settings read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub encrypted_password: String,
    #[serde(skip_serializing)]
    pub salt: String,
    pub role: UserRole,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub settings: UserSettings,
    pub subscriptions_count: i64,
    pub subscribers_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Personal,
    SubSite,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Personal => "personal",
            UserRole::SubSite => "sub_site",
        }
    }
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        match value {
            "sub_site" => UserRole::SubSite,
            _ => UserRole::Personal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub news_line_default: String,
    pub news_line_sort: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            news_line_default: "popular".to_string(),
            news_line_sort: "new".to_string(),
        }
    }
}

/// Sign-up payload as received from a handler.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One authenticated device binding.
///
/// The record is addressed by `id`; `user_id` is a reference to the owner, not
/// ownership. Only revocation ever mutates a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    pub id: String,
    pub user_id: String,
    pub device_label: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Revoked,
    Expired,
}

impl UserAuth {
    pub fn new(
        id: String,
        user_id: String,
        device_label: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            device_label,
            issued_at,
            expires_at,
            revoked_at: None,
        }
    }

    /// Revocation wins over expiry: both are terminal, but a revoked row stays revoked.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked_at.is_some() {
            SessionState::Revoked
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration) -> UserAuth {
        let now = Utc::now();
        UserAuth::new(
            "s1".into(),
            "u1".into(),
            "linux-firefox".into(),
            now,
            now + expires_in,
        )
    }

    #[test]
    fn state_follows_expiry_and_revocation() {
        let now = Utc::now();
        let mut live = session(Duration::hours(1));
        assert_eq!(live.state_at(now), SessionState::Active);

        live.revoked_at = Some(now);
        assert_eq!(live.state_at(now), SessionState::Revoked);

        let stale = session(Duration::seconds(-1));
        assert_eq!(stale.state_at(now), SessionState::Expired);
    }

    #[test]
    fn revoked_expired_session_reports_revoked() {
        let now = Utc::now();
        let mut stale = session(Duration::seconds(-10));
        stale.revoked_at = Some(now);
        assert_eq!(stale.state_at(now), SessionState::Revoked);
    }

    #[test]
    fn role_round_trips_through_storage_strings() {
        assert_eq!(UserRole::from(UserRole::SubSite.as_str()), UserRole::SubSite);
        assert_eq!(UserRole::from("something-else"), UserRole::Personal);
    }
}
