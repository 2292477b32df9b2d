//! Observable session/profile snapshot.

use uuid::Uuid;

use crate::types::{Profile, Session};

/// Where the store is in its lifecycle, derived from [`AuthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first session lookup.
    Initializing,
    /// A session is known and its profile fetch has not resolved.
    ResolvingProfile,
    Authenticated,
    Anonymous,
}

/// What views render. Published through a `watch` channel on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    /// Only ever `Some` while `session` is `Some` and for the same user.
    pub profile: Option<Profile>,
    pub loading: bool,
    pub mobile_sidebar_open: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { session: None, profile: None, loading: true, mobile_sidebar_open: false }
    }
}

impl AuthState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match (self.loading, self.session.is_some()) {
            (true, false) => Phase::Initializing,
            (true, true) => Phase::ResolvingProfile,
            (false, true) => Phase::Authenticated,
            (false, false) => Phase::Anonymous,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(Session::user_id)
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// The profile/session pairing rule every published state satisfies.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match (&self.session, &self.profile) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(session), Some(profile)) => session.user_id() == profile.id,
        }
    }
}
