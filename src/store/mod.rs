//! Session/profile store: the single view of "who is signed in".
//!
//! SYSTEM CONTEXT
//! ==============
//! Views read [`AuthState`] snapshots and call store operations; the store
//! talks to an injected [`AuthBackend`] and reports user-facing outcomes
//! through an injected [`Notifier`]. Session changes never flow back from
//! operations directly. They arrive on the backend's change channel and
//! are applied by a single listener task.
//!
//! ARCHITECTURE
//! ============
//! `SessionStore` wraps a pure [`Reducer`] behind a mutex. Every input is an
//! `Action`; the resulting state is published on a `watch` channel and any
//! `Effect::FetchProfile` is run as a spawned task that reports back with
//! its request token. The listener first resolves the initial session, then
//! drains buffered and live notifications in order, so a notification always
//! supersedes the initial lookup.
//!
//! TRADE-OFFS
//! ==========
//! Profile fetches are not cancelled when superseded. They run to
//! completion and the reducer drops the stale result, which costs an extra
//! request but keeps the runtime free of cancellation bookkeeping.

pub mod reducer;
pub mod state;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use reducer::{Action, Effect, Reducer, RequestToken};
pub use state::{AuthState, Phase};

use crate::client::{AuthBackend, AuthChange, AuthSubscription, ClientError, Delivery};
use crate::notify::{Notification, Notifier};
use crate::profile::{ProfileError, ProfileForm};
use crate::types::{OAuthProvider, Profile, SignUpMetadata};

/// How a successful sign-up ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account created; the user must confirm their email before signing in.
    ConfirmationPending,
    /// Account created and signed in immediately.
    SignedIn,
}

const SIGN_UP_PENDING_MESSAGE: &str = "Sign-up successful! Check your email to confirm your account.";
const NO_PROFILE_ROW_MESSAGE: &str = "Profile could not be updated. It may not exist or you may not have permission to edit it.";

// =============================================================================
// STORE
// =============================================================================

struct StoreInner {
    backend: Arc<dyn AuthBackend>,
    notifier: Arc<dyn Notifier>,
    reducer: Mutex<Reducer>,
    state_tx: watch::Sender<AuthState>,
    redirect_url: String,
}

pub struct SessionStore {
    inner: Arc<StoreInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Subscribe to the backend's change channel and start resolving the
    /// initial session.
    ///
    /// `redirect_url` is where OAuth providers send the browser back to.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, since the listener is
    /// spawned onto the current one.
    pub fn start(backend: Arc<dyn AuthBackend>, notifier: Arc<dyn Notifier>, redirect_url: impl Into<String>) -> Self {
        // Subscribe before the initial lookup so no change is missed between them.
        let subscription = backend.subscribe();
        let (state_tx, _) = watch::channel(AuthState::default());
        let inner = Arc::new(StoreInner {
            backend,
            notifier,
            reducer: Mutex::new(Reducer::new()),
            state_tx,
            redirect_url: redirect_url.into(),
        });
        let listener = tokio::spawn(listen(Arc::clone(&inner), subscription));
        Self { inner, listener: Mutex::new(Some(listener)) }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the store is no longer loading and return that snapshot.
    /// Never resolves if the store is shut down while still loading.
    pub async fn loaded(&self) -> AuthState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|state| !state.loading).await.map(|state| AuthState::clone(&state));
        result.unwrap_or_else(|_| self.state())
    }

    // -------------------------------------------------------------------------
    // authentication
    // -------------------------------------------------------------------------

    /// Prepare an external-provider login and return the URL the user must
    /// visit. The resulting session arrives later through the change channel.
    ///
    /// # Errors
    ///
    /// Returns the backend error after notifying the user.
    pub async fn login_with_oauth(&self, provider: OAuthProvider) -> Result<String, ClientError> {
        tracing::info!(%provider, "starting oauth login");
        match self.inner.backend.start_oauth_redirect(provider, &self.inner.redirect_url).await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::error!(%provider, error = %e, "oauth login failed");
                self.inner.notify(Notification::error(format!("{provider} sign-in failed: {e}")));
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// Returns the backend error after notifying the user. State is left
    /// untouched on failure.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<(), ClientError> {
        tracing::info!(email, "password login");
        match self.inner.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id(), "password login succeeded");
                self.inner.notify(Notification::success("Signed in successfully!"));
                Ok(())
            }
            Err(e) => {
                tracing::error!(email, error = %e, "password login failed");
                self.inner.notify(Notification::error(format!("Sign-in failed: {e}")));
                Err(e)
            }
        }
    }

    /// Create an account. `display_name` is forwarded as `full_name` so the
    /// server can provision the profile row.
    ///
    /// # Errors
    ///
    /// Returns the backend error after notifying the user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, ClientError> {
        tracing::info!(email, "sign-up");
        let metadata = SignUpMetadata { full_name: display_name.map(str::to_owned) };
        let response = match self.inner.backend.sign_up(email, password, &metadata).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(email, error = %e, "sign-up failed");
                self.inner.notify(Notification::error(format!("Sign-up failed: {e}")));
                return Err(e);
            }
        };

        let unconfirmed = response
            .user
            .as_ref()
            .and_then(|user| user.identities.as_ref())
            .is_some_and(Vec::is_empty);
        if unconfirmed {
            self.inner.notify(Notification::info(SIGN_UP_PENDING_MESSAGE));
            return Ok(SignUpOutcome::ConfirmationPending);
        }
        if response.session.is_some() {
            self.inner.notify(Notification::success("Sign-up successful and signed in!"));
            return Ok(SignUpOutcome::SignedIn);
        }
        if response.user.is_some() {
            self.inner.notify(Notification::info(SIGN_UP_PENDING_MESSAGE));
        } else {
            tracing::warn!(email, "sign-up returned neither user nor session");
        }
        Ok(SignUpOutcome::ConfirmationPending)
    }

    /// Sign out remotely. The cleared state normally arrives through the
    /// change channel; if the remote call fails the local state is cleared
    /// anyway so it never sticks half signed out.
    ///
    /// # Errors
    ///
    /// Returns the backend error after notifying the user.
    pub async fn logout(&self) -> Result<(), ClientError> {
        tracing::info!(user_id = ?self.state().user_id(), "logout");
        match self.inner.backend.sign_out().await {
            Ok(()) => {
                self.inner.notify(Notification::success("Signed out"));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "remote sign-out failed; clearing local session");
                self.inner.notify(Notification::error(format!("Sign-out failed: {e}")));
                self.inner.dispatch(Action::AuthChanged(AuthChange::SessionAbsent));
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // profile
    // -------------------------------------------------------------------------

    /// Re-fetch the signed-in user's profile and wait for it to land. No-op
    /// without a session. The fetch runs on its own task, so dropping this
    /// future does not abandon the request token it took.
    pub async fn refresh_profile(&self) {
        let Effect::FetchProfile { request, user_id } = self.inner.apply(Action::RefreshProfile) else {
            tracing::debug!("no session; profile refresh skipped");
            return;
        };
        if let Err(e) = self.inner.spawn_fetch(request, user_id).await {
            tracing::warn!(%user_id, error = %e, "profile refresh task did not complete");
        }
    }

    /// Validate and save the profile editor form for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotAuthenticated` without a session, a
    /// validation error for bad input, or the backend error. Every failure
    /// is also notified.
    pub async fn update_profile(&self, form: ProfileForm) -> Result<Profile, ProfileError> {
        let Some(user_id) = self.state().user_id() else {
            let err = ProfileError::NotAuthenticated;
            self.inner.notify(Notification::error(err.to_string()));
            return Err(err);
        };
        let update = match form.into_update() {
            Ok(update) => update,
            Err(e) => {
                self.inner.notify(Notification::error(e.to_string()));
                return Err(e);
            }
        };

        match self.inner.backend.update_profile_row(user_id, &update).await {
            Ok(profile) => {
                tracing::info!(%user_id, "profile updated");
                self.inner.notify(Notification::success("Profile updated successfully!"));
                self.inner.dispatch(Action::ProfileSaved(profile.clone()));
                Ok(profile)
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "profile update failed");
                let message = if e.is_no_rows() {
                    NO_PROFILE_ROW_MESSAGE.to_owned()
                } else {
                    format!("Profile update failed: {e}")
                };
                self.inner.notify(Notification::error(message));
                Err(ProfileError::Client(e))
            }
        }
    }

    pub fn toggle_mobile_sidebar(&self) {
        self.inner.dispatch(Action::ToggleMobileSidebar);
    }

    // -------------------------------------------------------------------------
    // teardown
    // -------------------------------------------------------------------------

    /// Stop listening for changes. Later notifications and in-flight profile
    /// fetches no longer affect state. Idempotent.
    pub fn shutdown(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.abort();
            tracing::debug!("session store shut down");
        }
        self.inner.dispatch(Action::Shutdown);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl StoreInner {
    /// Apply an action and publish the state if it changed.
    fn apply(&self, action: Action) -> Effect {
        let mut reducer = self.reducer.lock().unwrap_or_else(PoisonError::into_inner);
        let effect = reducer.apply(action);
        let next = reducer.state();
        self.state_tx.send_if_modified(|current| {
            if *current == *next {
                return false;
            }
            current.clone_from(next);
            true
        });
        effect
    }

    /// Apply an action and run its effect in the background.
    fn dispatch(self: &Arc<Self>, action: Action) {
        if let Effect::FetchProfile { request, user_id } = self.apply(action) {
            self.spawn_fetch(request, user_id);
        }
    }

    /// Fetch on a detached task that always reports back under `request`.
    fn spawn_fetch(self: &Arc<Self>, request: RequestToken, user_id: Uuid) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let profile = inner.fetch_profile(user_id).await;
            inner.apply(Action::ProfileLoaded { request, profile });
        })
    }

    /// Missing rows and fetch errors both resolve to no profile.
    async fn fetch_profile(&self, user_id: Uuid) -> Option<Profile> {
        match self.backend.fetch_profile_row(user_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::info!(%user_id, "no profile row for user");
                None
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "profile fetch failed");
                None
            }
        }
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    async fn load_initial(self: &Arc<Self>) {
        match self.backend.current_session().await {
            Ok(session) => {
                tracing::debug!(signed_in = session.is_some(), "initial session resolved");
                self.dispatch(Action::SessionLoaded(session));
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial session lookup failed; treating as signed out");
                self.dispatch(Action::SessionLoadFailed);
            }
        }
    }

    async fn resync(self: &Arc<Self>) {
        match self.backend.current_session().await {
            Ok(session) => self.dispatch(Action::AuthChanged(AuthChange::from_session(session))),
            Err(e) => tracing::warn!(error = %e, "session resync failed; keeping current state"),
        }
    }
}

// =============================================================================
// LISTENER
// =============================================================================

async fn listen(inner: Arc<StoreInner>, mut subscription: AuthSubscription) {
    inner.load_initial().await;
    while let Some(delivery) = subscription.recv().await {
        match delivery {
            Delivery::Event(notification) => {
                tracing::debug!(event = ?notification.event, "auth change received");
                inner.dispatch(Action::AuthChanged(notification.change));
            }
            Delivery::Lagged(missed) => {
                tracing::warn!(missed, "auth change subscriber lagged; resynchronising");
                inner.resync().await;
            }
        }
    }
    tracing::debug!("auth change channel closed");
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
