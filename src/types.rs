//! Domain types shared by the store and the remote client.
//!
//! DESIGN
//! ======
//! `Session` and `Profile` mirror the rows the hosted backend returns. The
//! store only cares about session presence and the embedded user id; the
//! profile is a cached, possibly-stale copy of the `profiles` row.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// =============================================================================
// SESSION
// =============================================================================

/// Identity embedded in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Linked identities. An empty list on a sign-up response means the
    /// address still has to be confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<UserIdentity>>,
}

/// One external identity linked to a user (email, google, azure, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub id: Option<String>,
    pub provider: String,
}

/// Authenticated session issued by the remote auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: i64,
    pub user: SessionUser,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True when the access token expires within `margin_secs` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at <= now + margin_secs
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// Closed set of application roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard learner account.
    #[default]
    Student,
    /// Content author.
    Teacher,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application profile row, keyed by the auth user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_phone_public: bool,
    /// Platform name to URL, e.g. `"linkedin"`. Cleared entries are stored
    /// as JSON `null` remotely and dropped here.
    #[serde(default, deserialize_with = "de_social_links")]
    pub social_links: Option<BTreeMap<String, String>>,
}

impl Profile {
    /// Look up a single social link by platform name.
    #[must_use]
    pub fn social_link(&self, platform: &str) -> Option<&str> {
        self.social_links
            .as_ref()
            .and_then(|links| links.get(platform))
            .map(String::as_str)
    }
}

fn de_social_links<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(raw.map(|links| {
        links
            .into_iter()
            .filter_map(|(platform, url)| url.map(|url| (platform, url)))
            .collect()
    }))
}

/// Column patch sent when the profile editor saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub phone_number: String,
    pub bio: String,
    /// `None` clears every link; `Some` entries set to `None` clear one link.
    pub social_links: Option<BTreeMap<String, Option<String>>>,
    /// RFC 3339 UTC timestamp.
    pub updated_at: String,
}

// =============================================================================
// SIGN-UP
// =============================================================================

/// Provisioning metadata forwarded to the server-side profile trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignUpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Raw sign-up result. A session is only present when the backend signs the
/// user in immediately (email confirmation disabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    pub user: Option<SessionUser>,
    pub session: Option<Session>,
}

// =============================================================================
// OAUTH PROVIDERS
// =============================================================================

/// External identity providers offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Microsoft,
}

impl OAuthProvider {
    /// Provider identifier understood by the auth service.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "azure",
        }
    }

    /// Human-readable name for notifications.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Microsoft => "Microsoft",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "microsoft" | "azure" => Ok(Self::Microsoft),
            other => Err(format!("unknown oauth provider: {other}")),
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
