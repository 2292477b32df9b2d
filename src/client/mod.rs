//! Remote auth/data client: the capability contract the store depends on.
//!
//! ARCHITECTURE
//! ============
//! The store never talks HTTP directly. It holds an `Arc<dyn AuthBackend>`
//! and reacts to the backend's change channel, so tests can swap in a
//! scripted backend and feed synthetic events.

pub mod events;
pub mod pkce;
pub mod supabase;

use uuid::Uuid;

pub use events::{AuthChange, AuthEvent, AuthEvents, AuthNotification, AuthSubscription, Delivery};
pub use supabase::SupabaseBackend;

use crate::error::ErrorCode;
use crate::types::{OAuthProvider, Profile, ProfileUpdate, Session, SignUpMetadata, SignUpResponse};

/// PostgREST error code for "zero rows where exactly one was requested".
pub const NO_ROWS_CODE: &str = "PGRST116";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote auth/data operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Email/password rejected by the auth service.
    #[error("invalid login credentials: {0}")]
    Credentials(String),

    /// The OAuth provider is not enabled on the project.
    #[error("oauth provider {provider} is not enabled")]
    ProviderDisabled { provider: String },

    /// A code exchange was attempted without a pending PKCE verifier.
    #[error("no pending oauth flow to complete")]
    MissingCodeVerifier,

    /// The HTTP request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("api error {status}: {message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// Reading or writing the persisted session failed.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ClientError {
    /// True for the PostgREST "no row matched" outcome.
    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::Api { status: 406, .. })
            || matches!(self, Self::Api { code: Some(code), .. } if code == NO_ROWS_CODE)
    }
}

impl ErrorCode for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "E_CREDENTIALS",
            Self::ProviderDisabled { .. } => "E_PROVIDER_DISABLED",
            Self::MissingCodeVerifier => "E_MISSING_CODE_VERIFIER",
            Self::Request(_) => "E_REQUEST",
            Self::Api { .. } => "E_API_RESPONSE",
            Self::Parse(_) => "E_API_PARSE",
            Self::Storage(_) => "E_SESSION_STORAGE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Api { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// Remote auth + profile-row capability.
///
/// Implementations deliver session changes through [`AuthBackend::subscribe`]
/// rather than by mutating caller state: a successful sign-in emits
/// `SignedIn`, sign-out emits `SignedOut`, and so on.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, refreshing it first if it has expired.
    async fn current_session(&self) -> Result<Option<Session>, ClientError>;

    /// Subscribe to session change notifications.
    fn subscribe(&self) -> AuthSubscription;

    /// Prepare an external-provider login and return the URL to navigate to.
    async fn start_oauth_redirect(&self, provider: OAuthProvider, return_url: &str) -> Result<String, ClientError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ClientError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, ClientError>;

    /// Revoke the session remotely and discard it locally. The local copy is
    /// discarded and `SignedOut` emitted even when the remote call fails.
    async fn sign_out(&self) -> Result<(), ClientError>;

    /// Complete an OAuth login from the callback's authorization code.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ClientError>;

    /// Fetch exactly one profile row. `Ok(None)` when no row exists yet.
    async fn fetch_profile_row(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError>;

    async fn update_profile_row(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ClientError>;
}
