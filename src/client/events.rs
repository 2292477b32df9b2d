//! Auth change-notification channel.
//!
//! DESIGN
//! ======
//! The remote client pushes session lifecycle events over a
//! `tokio::sync::broadcast` channel instead of invoking callbacks. Each
//! subscriber owns an `AuthSubscription`; dropping it (or calling
//! `unsubscribe`) releases the receiver, so nothing is delivered after
//! teardown.
//!
//! TRADE-OFFS
//! ==========
//! Broadcast receivers that fall behind lose the oldest events and see a
//! `Delivery::Lagged` marker. Subscribers are expected to resynchronise by
//! re-reading the current session rather than replaying history.

use tokio::sync::broadcast;

use crate::types::Session;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Why the auth service emitted a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session state carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SessionPresent(Session),
    SessionAbsent,
}

impl AuthChange {
    #[must_use]
    pub fn from_session(session: Option<Session>) -> Self {
        session.map_or(Self::SessionAbsent, Self::SessionPresent)
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SessionPresent(session) => Some(session),
            Self::SessionAbsent => None,
        }
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthNotification {
    pub event: AuthEvent,
    pub change: AuthChange,
}

/// Item yielded by [`AuthSubscription::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(AuthNotification),
    /// The subscriber fell behind and `n` notifications were dropped.
    Lagged(u64),
}

/// Sending half of the change channel, owned by a backend.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthNotification>,
}

impl AuthEvents {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a notification to every live subscriber.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let notification = AuthNotification { event, change: AuthChange::from_session(session) };
        // No live subscribers is not an error.
        let delivered = self.tx.send(notification).unwrap_or(0);
        tracing::debug!(?event, delivered, "auth event emitted");
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription { rx: Some(self.tx.subscribe()) }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Receiving half of the change channel.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: Option<broadcast::Receiver<AuthNotification>>,
}

impl AuthSubscription {
    /// Wait for the next delivery. Returns `None` once unsubscribed or once
    /// the backend has gone away.
    pub async fn recv(&mut self) -> Option<Delivery> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Ok(notification) => Some(Delivery::Event(notification)),
            Err(broadcast::error::RecvError::Lagged(n)) => Some(Delivery::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => {
                self.rx = None;
                None
            }
        }
    }

    /// Stop receiving. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
