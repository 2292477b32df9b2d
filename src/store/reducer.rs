//! Pure state transitions for the session store.
//!
//! DESIGN
//! ======
//! Every input (initial lookup, change notification, fetch completion,
//! user toggle) becomes an [`Action`]. `Reducer::apply` mutates the state in
//! one step and returns the follow-up [`Effect`] for the runtime to execute.
//! Nothing here awaits or touches the network, so ordering questions are
//! answered entirely by the order actions are applied.
//!
//! STALE FETCHES
//! =============
//! Each profile fetch is tagged with a fresh `RequestToken`. Only the most
//! recently issued token may write a profile; a fetch that resolves after
//! sign-out, after a newer session, or after shutdown is dropped. This keeps
//! the "profile implies matching session" rule intact no matter how slow a
//! fetch is.

use uuid::Uuid;

use super::state::AuthState;
use crate::client::AuthChange;
use crate::types::{Profile, Session};

/// Identifies one issued profile fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Result of the initial session lookup.
    SessionLoaded(Option<Session>),
    /// The initial session lookup failed.
    SessionLoadFailed,
    /// A change notification from the backend.
    AuthChanged(AuthChange),
    /// A profile fetch finished. `None` covers both "no row" and failure.
    ProfileLoaded { request: RequestToken, profile: Option<Profile> },
    RefreshProfile,
    /// The backend returned the row written by a profile update.
    ProfileSaved(Profile),
    ToggleMobileSidebar,
    Shutdown,
}

/// Follow-up work requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    FetchProfile { request: RequestToken, user_id: Uuid },
}

#[derive(Debug, Default)]
pub struct Reducer {
    state: AuthState,
    next_request: u64,
    pending: Option<RequestToken>,
    closed: bool,
}

impl Reducer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Token of the fetch currently allowed to write a profile, if any.
    #[must_use]
    pub fn pending(&self) -> Option<RequestToken> {
        self.pending
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        if self.closed {
            tracing::trace!(?action, "store closed; action ignored");
            return Effect::None;
        }
        match action {
            Action::SessionLoaded(Some(session)) | Action::AuthChanged(AuthChange::SessionPresent(session)) => {
                self.session_present(session)
            }
            Action::SessionLoaded(None) | Action::SessionLoadFailed | Action::AuthChanged(AuthChange::SessionAbsent) => {
                self.session_absent();
                Effect::None
            }
            Action::ProfileLoaded { request, profile } => {
                self.profile_loaded(request, profile);
                Effect::None
            }
            Action::RefreshProfile => match self.state.user_id() {
                Some(user_id) => self.issue_fetch(user_id),
                None => Effect::None,
            },
            Action::ProfileSaved(profile) => {
                if self.state.user_id() == Some(profile.id) {
                    self.state.profile = Some(profile);
                }
                Effect::None
            }
            Action::ToggleMobileSidebar => {
                self.state.mobile_sidebar_open = !self.state.mobile_sidebar_open;
                Effect::None
            }
            Action::Shutdown => {
                self.closed = true;
                self.pending = None;
                Effect::None
            }
        }
    }

    fn session_present(&mut self, session: Session) -> Effect {
        let user_id = session.user_id();
        // A token refresh for the same user keeps the cached profile visible.
        if self.state.profile.as_ref().is_some_and(|p| p.id != user_id) {
            self.state.profile = None;
        }
        self.state.session = Some(session);
        self.state.loading = true;
        self.issue_fetch(user_id)
    }

    fn session_absent(&mut self) {
        self.state.session = None;
        self.state.profile = None;
        self.state.loading = false;
        self.pending = None;
    }

    fn profile_loaded(&mut self, request: RequestToken, profile: Option<Profile>) {
        if self.pending != Some(request) {
            tracing::debug!(?request, "stale profile fetch ignored");
            return;
        }
        self.pending = None;
        self.state.loading = false;
        let user_id = self.state.user_id();
        self.state.profile = profile.filter(|p| Some(p.id) == user_id);
    }

    fn issue_fetch(&mut self, user_id: Uuid) -> Effect {
        self.next_request += 1;
        let request = RequestToken(self.next_request);
        self.pending = Some(request);
        Effect::FetchProfile { request, user_id }
    }
}

#[cfg(test)]
#[path = "reducer_test.rs"]
mod tests;
