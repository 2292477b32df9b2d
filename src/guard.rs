//! Route protection decisions derived from [`AuthState`].
//!
//! Member pages wait for the store to finish loading and then bounce
//! anonymous visitors to the login page, remembering where they were going.
//! Guest pages (login, signup) send already signed-in users to the dashboard.

use std::fmt::Write as _;

use crate::callback::DEFAULT_NEXT;
use crate::store::AuthState;

pub const LOGIN_PATH: &str = "/login";

const MEMBER_PAGES: [&str; 2] = ["/dashboard", "/profile"];
const GUEST_PAGES: [&str; 2] = ["/login", "/signup"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Session still resolving; render a loading indicator.
    Wait,
    /// Navigate to this app-relative location instead.
    Redirect(String),
}

/// True once loading has finished with nobody signed in.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.loading && state.session.is_none()
}

/// Login page location that returns to `next_path` afterwards.
#[must_use]
pub fn login_redirect(next_path: &str) -> String {
    let mut location = format!("{LOGIN_PATH}?next=");
    for byte in next_path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'/' | b'-' | b'_' | b'.' | b'~') {
            location.push(char::from(byte));
        } else {
            let _ = write!(location, "%{byte:02X}");
        }
    }
    location
}

/// What a view at `path` should do given the current auth state.
#[must_use]
pub fn route_decision(path: &str, state: &AuthState) -> RouteDecision {
    if matches_any(path, &MEMBER_PAGES) {
        if state.loading {
            return RouteDecision::Wait;
        }
        if should_redirect_unauth(state) {
            return RouteDecision::Redirect(login_redirect(path));
        }
        return RouteDecision::Allow;
    }
    if matches_any(path, &GUEST_PAGES) && !state.loading && state.session.is_some() {
        return RouteDecision::Redirect(DEFAULT_NEXT.to_owned());
    }
    RouteDecision::Allow
}

/// `path` is one of `prefixes` or nested below it.
fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    prefixes.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
