//! Client-side authentication and profile session core for the LMS.
//!
//! SYSTEM CONTEXT
//! ==============
//! A hosted auth/data service (GoTrue + PostgREST) owns users, sessions and
//! the `profiles` table. This crate keeps one consistent local answer to
//! "who is signed in and what is their profile", driven by the service's
//! change notifications, and exposes the operations views need: sign-in,
//! sign-up, sign-out, OAuth callback handling, profile editing and route
//! protection.
//!
//! ARCHITECTURE
//! ============
//! - `client`: the [`client::AuthBackend`] capability, its change channel,
//!   and the HTTP implementation.
//! - `store`: reducer plus runtime that turns notifications into
//!   [`store::AuthState`] snapshots.
//! - `callback`, `guard`, `profile`: pure helpers around the store.
//! - `notify`: user-visible messages emitted by store operations.

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod notify;
pub mod profile;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::{AuthBackend, ClientError, SupabaseBackend};
pub use config::BackendConfig;
pub use error::ErrorCode;
pub use notify::{ChannelNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use profile::{ProfileError, ProfileForm};
pub use store::{AuthState, Phase, SessionStore, SignUpOutcome};
pub use types::{OAuthProvider, Profile, Role, Session};
