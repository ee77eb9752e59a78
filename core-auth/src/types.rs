use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Profile of the signed-in user as returned by the provider's `/users`
/// endpoint.
///
/// Only `id` and `display_name` are guaranteed; everything else depends on
/// the granted scopes and is kept optional.
///
/// # Examples
///
/// ```
/// use core_auth::UserProfile;
///
/// let profile: UserProfile = serde_json::from_str(
///     r#"{"id": 1, "display_name": "Bob", "email": "b@x.com", "profile_image_url": "u"}"#,
/// ).unwrap();
///
/// assert_eq!(profile.id, "1");
/// assert_eq!(profile.display_name, "Bob");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider-assigned user id. Accepts JSON strings and numbers.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub login: Option<String>,
    pub display_name: String,
    /// Present only with the `user:read:email` scope
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub broadcaster_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Bearer access token from the implicit grant.
///
/// # Security
///
/// Tokens must never be logged. The `Debug` implementation redacts the value.
///
/// # Examples
///
/// ```
/// use core_auth::AccessToken;
///
/// let token = AccessToken::new("tok1");
/// assert_eq!(token.bearer_header(), "Bearer tok1");
/// assert!(!format!("{:?}", token).contains("tok1"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for request signing and revocation only.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// What the session is doing right now.
///
/// # State Transitions
///
/// ```text
/// Idle -> SigningIn -> Idle
/// Idle -> SigningOut -> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AuthStatus {
    #[default]
    Idle,
    SigningIn,
    SigningOut,
}

impl AuthStatus {
    /// Returns `true` while a sign-in or sign-out runs.
    pub fn is_busy(&self) -> bool {
        !matches!(self, AuthStatus::Idle)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStatus::Idle => write!(f, "Idle"),
            AuthStatus::SigningIn => write!(f, "Signing In..."),
            AuthStatus::SigningOut => write!(f, "Signing Out..."),
        }
    }
}

/// Point-in-time view of the session handed to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub token: Option<AccessToken>,
    pub status: AuthStatus,
}

impl SessionSnapshot {
    pub fn is_logging_in(&self) -> bool {
        self.status == AuthStatus::SigningIn
    }

    pub fn is_logging_out(&self) -> bool {
        self.status == AuthStatus::SigningOut
    }

    /// A user is present. A token without a user (failed profile fetch) does
    /// not count as signed in.
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// `Authorization` header value requests would carry, if any.
    pub fn authorization_header(&self) -> Option<String> {
        self.token.as_ref().map(AccessToken::bearer_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_numeric_id() {
        let json = r#"{"id":1,"display_name":"Bob","email":"b@x.com","profile_image_url":"u"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.id, "1");
        assert_eq!(profile.display_name, "Bob");
        assert_eq!(profile.email.as_deref(), Some("b@x.com"));
        assert_eq!(profile.profile_image_url.as_deref(), Some("u"));
        assert_eq!(profile.login, None);
    }

    #[test]
    fn test_profile_full_payload() {
        let json = r#"{
            "id": "141981764",
            "login": "twitchdev",
            "display_name": "TwitchDev",
            "type": "",
            "broadcaster_type": "partner",
            "description": "Supporting third-party developers",
            "profile_image_url": "https://static-cdn.jtvnw.net/jtv_user_pictures/profile.png",
            "offline_image_url": "https://static-cdn.jtvnw.net/jtv_user_pictures/offline.png",
            "view_count": 5980557,
            "email": "not-real@email.com",
            "created_at": "2016-12-14T20:32:28Z"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.id, "141981764");
        assert_eq!(profile.login.as_deref(), Some("twitchdev"));
        assert_eq!(profile.broadcaster_type.as_deref(), Some("partner"));
        assert!(profile.created_at.is_some());
    }

    #[test]
    fn test_profile_requires_display_name() {
        let result: Result<UserProfile, _> = serde_json::from_str(r#"{"id":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken::new("secret_access_token");
        let debug_str = format!("{:?}", token);

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_access_token"));
        assert_eq!(token.secret(), "secret_access_token");
    }

    #[test]
    fn test_auth_status_default_and_busy() {
        assert_eq!(AuthStatus::default(), AuthStatus::Idle);
        assert!(!AuthStatus::Idle.is_busy());
        assert!(AuthStatus::SigningIn.is_busy());
        assert!(AuthStatus::SigningOut.is_busy());
    }

    #[test]
    fn test_auth_status_display() {
        assert_eq!(format!("{}", AuthStatus::Idle), "Idle");
        assert_eq!(format!("{}", AuthStatus::SigningIn), "Signing In...");
        assert_eq!(format!("{}", AuthStatus::SigningOut), "Signing Out...");
    }

    #[test]
    fn test_snapshot_helpers() {
        let empty = SessionSnapshot::default();
        assert!(!empty.is_signed_in());
        assert!(!empty.is_logging_in());
        assert_eq!(empty.authorization_header(), None);

        let partial = SessionSnapshot {
            user: None,
            token: Some(AccessToken::new("tok1")),
            status: AuthStatus::SigningIn,
        };
        assert!(!partial.is_signed_in());
        assert!(partial.is_logging_in());
        assert!(!partial.is_logging_out());
        assert_eq!(partial.authorization_header().as_deref(), Some("Bearer tok1"));
    }
}
