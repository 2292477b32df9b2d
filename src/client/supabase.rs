//! Hosted backend client for GoTrue auth endpoints and PostgREST profile rows.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper over `/auth/v1/*` and `/rest/v1/profiles`. The current
//! session (and a pending PKCE verifier) live in memory and, when a session
//! file is configured, on disk so separate CLI runs share one login.
//! Every session transition is announced on the change channel; callers
//! never receive state updates any other way.
//!
//! ERROR HANDLING
//! ==============
//! Non-success responses become `ClientError::Api` with the message pulled
//! from either GoTrue (`error_description`/`msg`) or PostgREST
//! (`message`/`code`) bodies. Failing to persist the session is logged and
//! does not fail the operation that produced it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::events::{AuthEvent, AuthEvents, AuthSubscription};
use super::pkce::{self, PkcePair};
use super::{AuthBackend, ClientError};
use crate::config::BackendConfig;
use crate::types::{
    OAuthProvider, Profile, ProfileUpdate, Session, SessionUser, SignUpMetadata, SignUpResponse,
};

/// Refresh the access token this many seconds before it expires.
const REFRESH_MARGIN_SECS: i64 = 10;
/// Token lifetime assumed when the grant omits both expiry fields.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
/// PostgREST single-object media type; zero rows answer 406.
const PGRST_OBJECT: &str = "application/vnd.pgrst.object+json";

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenGrant {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_owned()),
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthSettings {
    #[serde(default)]
    external: HashMap<String, bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredAuth {
    #[serde(default)]
    session: Option<Session>,
    #[serde(default)]
    code_verifier: Option<String>,
}

impl StoredAuth {
    fn is_empty(&self) -> bool {
        self.session.is_none() && self.code_verifier.is_none()
    }
}

#[derive(Debug, Default)]
struct AuthCache {
    loaded: bool,
    stored: StoredAuth,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session_file: Option<PathBuf>,
    events: AuthEvents,
    cache: Mutex<AuthCache>,
}

impl SupabaseBackend {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            session_file: config.session_file.clone(),
            events: AuthEvents::default(),
            cache: Mutex::new(AuthCache::default()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, ClientError> {
        let path = format!("auth/v1/token?grant_type={grant_type}");
        let (status, text) = send(self.request(Method::POST, &path, None).json(&body)).await?;
        let grant: TokenGrant = parse_body(status, &text)?;
        Ok(grant.into_session(unix_now()))
    }

    async fn revoke(&self, token: &str) -> Result<(), ClientError> {
        let (status, text) = send(self.request(Method::POST, "auth/v1/logout?scope=global", Some(token))).await?;
        // Already-invalid tokens still count as signed out.
        let already_gone = matches!(status.as_u16(), 401 | 403 | 404);
        if status.is_success() || already_gone {
            return Ok(());
        }
        Err(api_error(status.as_u16(), &text))
    }

    async fn access_token(&self) -> Result<Option<String>, ClientError> {
        let cache = self.cache().await?;
        Ok(cache.stored.session.as_ref().map(|s| s.access_token.clone()))
    }

    // -------------------------------------------------------------------------
    // persistence
    // -------------------------------------------------------------------------

    async fn cache(&self) -> Result<MutexGuard<'_, AuthCache>, ClientError> {
        let mut cache = self.cache.lock().await;
        if !cache.loaded {
            cache.stored = self.load_stored().await?;
            cache.loaded = true;
        }
        Ok(cache)
    }

    async fn load_stored(&self) -> Result<StoredAuth, ClientError> {
        let Some(path) = &self.session_file else {
            return Ok(StoredAuth::default());
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(stored) => Ok(stored),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable session file");
                    Ok(StoredAuth::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredAuth::default()),
            Err(e) => Err(ClientError::Storage(e.to_string())),
        }
    }

    async fn persist(&self, stored: &StoredAuth) -> Result<(), ClientError> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        if stored.is_empty() {
            return match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ClientError::Storage(e.to_string())),
            };
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::Storage(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(stored).map_err(|e| ClientError::Storage(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))
    }

    async fn persist_logged(&self, stored: &StoredAuth) {
        if let Err(e) = self.persist(stored).await {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    async fn set_session(&self, session: Option<Session>) -> Result<(), ClientError> {
        let mut cache = self.cache().await?;
        cache.stored.session = session;
        self.persist_logged(&cache.stored).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseBackend {
    async fn current_session(&self) -> Result<Option<Session>, ClientError> {
        let mut cache = self.cache().await?;
        let Some(session) = cache.stored.session.clone() else {
            return Ok(None);
        };
        if !session.expires_within(unix_now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let refreshed = self
            .grant("refresh_token", serde_json::json!({ "refresh_token": session.refresh_token }))
            .await;
        match refreshed {
            Ok(fresh) => {
                cache.stored.session = Some(fresh.clone());
                self.persist_logged(&cache.stored).await;
                drop(cache);
                tracing::debug!(user_id = %fresh.user_id(), "session refreshed");
                self.events.emit(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(ClientError::Api { status: 400..=499, message, .. }) => {
                tracing::warn!(user_id = %session.user_id(), %message, "refresh token rejected; discarding session");
                cache.stored.session = None;
                self.persist_logged(&cache.stored).await;
                drop(cache);
                self.events.emit(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn start_oauth_redirect(&self, provider: OAuthProvider, return_url: &str) -> Result<String, ClientError> {
        let (status, text) = send(self.request(Method::GET, "auth/v1/settings", None)).await?;
        let settings: AuthSettings = parse_body(status, &text)?;
        if !settings
            .external
            .get(provider.slug())
            .copied()
            .unwrap_or(false)
        {
            return Err(ClientError::ProviderDisabled { provider: provider.slug().to_owned() });
        }

        let pair = PkcePair::generate();
        let url = Url::parse_with_params(
            &self.endpoint("auth/v1/authorize"),
            &[
                ("provider", provider.slug()),
                ("redirect_to", return_url),
                ("code_challenge", pair.challenge.as_str()),
                ("code_challenge_method", pkce::CHALLENGE_METHOD),
            ],
        )
        .map_err(|e| ClientError::Parse(e.to_string()))?;

        let mut cache = self.cache().await?;
        cache.stored.code_verifier = Some(pair.verifier);
        self.persist_logged(&cache.stored).await;

        tracing::info!(provider = provider.slug(), "oauth redirect prepared");
        Ok(url.to_string())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session = match self
            .grant("password", serde_json::json!({ "email": email, "password": password }))
            .await
        {
            Ok(session) => session,
            Err(ClientError::Api { status: 400, message, .. }) => return Err(ClientError::Credentials(message)),
            Err(e) => return Err(e),
        };
        self.set_session(Some(session.clone())).await?;
        self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, ClientError> {
        let payload = serde_json::json!({ "email": email, "password": password, "data": metadata });
        let (status, text) = send(self.request(Method::POST, "auth/v1/signup", None).json(&payload)).await?;
        let value: serde_json::Value = parse_body(status, &text)?;

        if value.get("access_token").is_some() {
            let grant: TokenGrant = serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))?;
            let session = grant.into_session(unix_now());
            self.set_session(Some(session.clone())).await?;
            self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
            return Ok(SignUpResponse { user: Some(session.user.clone()), session: Some(session) });
        }

        // Confirmation pending: the body is the bare user (older servers nest it).
        let user_value = value.get("user").cloned().unwrap_or(value);
        let user = if user_value.get("id").is_some() {
            Some(serde_json::from_value::<SessionUser>(user_value).map_err(|e| ClientError::Parse(e.to_string()))?)
        } else {
            None
        };
        Ok(SignUpResponse { user, session: None })
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let remote = match self.access_token().await? {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };
        // The local session goes even when the server could not revoke it.
        if let Err(e) = &remote {
            tracing::warn!(error = %e, "remote sign-out failed; discarding local session");
        }
        self.set_session(None).await?;
        self.events.emit(AuthEvent::SignedOut, None);
        remote
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ClientError> {
        let verifier = self
            .cache()
            .await?
            .stored
            .code_verifier
            .clone()
            .ok_or(ClientError::MissingCodeVerifier)?;

        let session = self
            .grant("pkce", serde_json::json!({ "auth_code": code, "code_verifier": verifier }))
            .await?;

        let mut cache = self.cache().await?;
        cache.stored.session = Some(session.clone());
        cache.stored.code_verifier = None;
        self.persist_logged(&cache.stored).await;
        drop(cache);

        self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn fetch_profile_row(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError> {
        let token = self.access_token().await?;
        let path = format!("rest/v1/profiles?id=eq.{user_id}&select=*");
        let request = self
            .request(Method::GET, &path, token.as_deref())
            .header(ACCEPT, PGRST_OBJECT);
        let (status, text) = send(request).await?;
        match parse_body::<Profile>(status, &text) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_profile_row(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        let token = self.access_token().await?;
        let path = format!("rest/v1/profiles?id=eq.{user_id}");
        let request = self
            .request(Method::PATCH, &path, token.as_deref())
            .header(ACCEPT, PGRST_OBJECT)
            .header("Prefer", "return=representation")
            .json(update);
        let (status, text) = send(request).await?;
        parse_body(status, &text)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

async fn send(request: RequestBuilder) -> Result<(StatusCode, String), ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::Request(e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ClientError::Request(e.to_string()))?;
    Ok((status, text))
}

fn parse_body<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, ClientError> {
    if !status.is_success() {
        return Err(api_error(status.as_u16(), text));
    }
    serde_json::from_str(text).map_err(|e| ClientError::Parse(e.to_string()))
}

/// Map an error response body from either service into `ClientError::Api`.
pub(crate) fn api_error(status: u16, text: &str) -> ClientError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let code = body
        .error_code
        .or_else(|| match body.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        })
        .or_else(|| body.error.clone());
    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() { format!("HTTP {status}") } else { trimmed.to_owned() }
        });
    ClientError::Api { status, code, message }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
