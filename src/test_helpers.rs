//! Fixtures and in-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::client::{AuthBackend, AuthEvent, AuthEvents, AuthSubscription, ClientError};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::types::{
    OAuthProvider, Profile, ProfileUpdate, Role, Session, SessionUser, SignUpMetadata, SignUpResponse,
};

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";

#[must_use]
pub fn session_for(user_id: Uuid) -> Session {
    Session {
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        token_type: "bearer".into(),
        expires_at: i64::MAX,
        user: SessionUser { id: user_id, email: Some(EMAIL.into()), identities: None },
    }
}

#[must_use]
pub fn profile_for(user_id: Uuid) -> Profile {
    Profile {
        id: user_id,
        full_name: Some("Ada Lovelace".into()),
        avatar_url: None,
        role: Role::Student,
        bio: None,
        phone_number: Some("+44 20 7946 0000".into()),
        is_phone_public: false,
        social_links: None,
    }
}

// =============================================================================
// ScriptedBackend
// =============================================================================

/// Canned responses for [`ScriptedBackend`].
#[derive(Debug, Default)]
pub struct Script {
    /// Returned by `current_session`.
    pub session: Option<Session>,
    pub session_error: bool,
    /// User signed in by a correct password.
    pub user_id: Option<Uuid>,
    pub profiles: HashMap<Uuid, Profile>,
    pub profile_error: bool,
    pub oauth_error: bool,
    pub sign_out_error: bool,
    pub sign_up: Option<SignUpResponse>,
    pub sign_up_error: bool,
    /// Update failure as `(status, code)`.
    pub update_error: Option<(u16, Option<String>)>,
    pub calls: Vec<&'static str>,
    pub updates: Vec<ProfileUpdate>,
}

/// In-memory `AuthBackend` that follows a [`Script`] and emits the same
/// change notifications a real backend would.
pub struct ScriptedBackend {
    pub events: AuthEvents,
    script: Mutex<Script>,
    hold_fetches: AtomicBool,
    gate: Semaphore,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self {
            events: AuthEvents::default(),
            script: Mutex::new(script),
            hold_fetches: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Backend that accepts [`EMAIL`]/[`PASSWORD`] for `user_id` and has a
    /// profile row for that user.
    #[must_use]
    pub fn with_user(user_id: Uuid) -> Self {
        let mut script = Script { user_id: Some(user_id), ..Script::default() };
        script.profiles.insert(user_id, profile_for(user_id));
        Self::new(script)
    }

    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.lock());
    }

    #[must_use]
    pub fn calls(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == name).count()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<ProfileUpdate> {
        self.lock().updates.clone()
    }

    /// Make profile fetches block until [`Self::release_fetches`].
    pub fn hold_fetches(&self) {
        self.hold_fetches.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.hold_fetches.store(false, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.lock();
        script.calls.push(call);
        script
    }
}

fn service_error(status: u16, message: &str) -> ClientError {
    ClientError::Api { status, code: None, message: message.into() }
}

#[async_trait::async_trait]
impl AuthBackend for ScriptedBackend {
    async fn current_session(&self) -> Result<Option<Session>, ClientError> {
        let script = self.record("current_session");
        if script.session_error {
            return Err(ClientError::Request("connection refused".into()));
        }
        Ok(script.session.clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn start_oauth_redirect(&self, provider: OAuthProvider, return_url: &str) -> Result<String, ClientError> {
        let script = self.record("start_oauth_redirect");
        if script.oauth_error {
            return Err(ClientError::ProviderDisabled { provider: provider.slug().into() });
        }
        Ok(format!("https://auth.test/authorize?provider={}&redirect_to={return_url}", provider.slug()))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session = {
            let mut script = self.record("sign_in_with_password");
            let user_id = script
                .user_id
                .filter(|_| email == EMAIL && password == PASSWORD)
                .ok_or_else(|| ClientError::Credentials("Invalid login credentials".into()))?;
            let session = session_for(user_id);
            script.session = Some(session.clone());
            session
        };
        self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, ClientError> {
        let response = {
            let script = self.record("sign_up");
            if script.sign_up_error {
                return Err(service_error(422, "User already registered"));
            }
            script
                .sign_up
                .clone()
                .unwrap_or(SignUpResponse { user: None, session: None })
        };
        if let Some(session) = &response.session {
            self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(response)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let mut failed = false;
        {
            let mut script = self.record("sign_out");
            script.session = None;
            if script.sign_out_error {
                failed = true;
            }
        }
        self.events.emit(AuthEvent::SignedOut, None);
        if failed {
            return Err(service_error(500, "sign-out failed"));
        }
        Ok(())
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ClientError> {
        let session = {
            let mut script = self.record("exchange_code_for_session");
            let user_id = script
                .user_id
                .filter(|_| code == "good-code")
                .ok_or_else(|| service_error(400, "invalid flow state"))?;
            let session = session_for(user_id);
            script.session = Some(session.clone());
            session
        };
        self.events.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn fetch_profile_row(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError> {
        drop(self.record("fetch_profile_row"));
        if self.hold_fetches.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.unwrap();
        }
        let script = self.lock();
        if script.profile_error {
            return Err(service_error(500, "relation \"profiles\" does not exist"));
        }
        Ok(script.profiles.get(&user_id).cloned())
    }

    async fn update_profile_row(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        let mut script = self.record("update_profile_row");
        if let Some((status, code)) = script.update_error.clone() {
            return Err(ClientError::Api { status, code, message: "update failed".into() });
        }
        script.updates.push(update.clone());
        let mut profile = script.profiles.get(&user_id).cloned().unwrap_or_else(|| profile_for(user_id));
        profile.full_name = Some(update.full_name.clone());
        profile.phone_number = Some(update.phone_number.clone());
        profile.bio = Some(update.bio.clone());
        profile.social_links = update.social_links.as_ref().map(|links| {
            links
                .iter()
                .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
                .collect()
        });
        script.profiles.insert(user_id, profile.clone());
        Ok(profile)
    }
}

// =============================================================================
// RecordingNotifier
// =============================================================================

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Notification> {
        self.all().pop()
    }

    #[must_use]
    pub fn count(&self, level: NotificationLevel) -> usize {
        self.all().iter().filter(|n| n.level == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
