//! OAuth callback handling.
//!
//! DESIGN
//! ======
//! The provider sends the browser back to `/auth/callback?code=..&next=..`.
//! The code is exchanged for a session and the user is forwarded to `next`,
//! but only if it stays on the app's own origin. Anything that goes wrong
//! lands on the auth error page with a human-readable description.

use reqwest::Url;

use crate::client::AuthBackend;
use crate::error::ErrorCode;

/// Where a successful login lands when `next` is absent or unsafe.
pub const DEFAULT_NEXT: &str = "/dashboard";
pub const ERROR_PATH: &str = "/auth/auth-code-error";
pub const FALLBACK_ERROR: &str = "OAuth callback failed due to missing code or an exchange error.";

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ErrorCode for CallbackError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "E_CALLBACK_URL",
        }
    }
}

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
    pub error_description: Option<String>,
}

/// Outcome of handling a callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRedirect {
    /// Absolute URL to send the browser to.
    pub location: String,
    pub signed_in: bool,
}

/// Split a full callback URL into its origin and query.
///
/// # Errors
///
/// Returns `CallbackError::InvalidUrl` if `url` is not an absolute http(s) URL.
pub fn parse_callback_url(url: &str) -> Result<(String, CallbackQuery), CallbackError> {
    let invalid = |reason: &str| CallbackError::InvalidUrl { url: url.to_owned(), reason: reason.to_owned() };
    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }

    let mut query = CallbackQuery::default();
    for (key, value) in parsed.query_pairs() {
        let slot = match key.as_ref() {
            "code" => &mut query.code,
            "next" => &mut query.next,
            "error_description" => &mut query.error_description,
            _ => continue,
        };
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.into_owned());
        }
    }
    Ok((parsed.origin().ascii_serialization(), query))
}

/// Absolute post-login destination for `next`, confined to `origin`.
#[must_use]
pub fn resolve_next(origin: &str, next: Option<&str>) -> String {
    let fallback = format!("{origin}{DEFAULT_NEXT}");
    let next = next.unwrap_or(DEFAULT_NEXT);
    if next.starts_with('/') {
        return format!("{origin}{next}");
    }
    match Url::parse(next) {
        Ok(url) if url.origin().ascii_serialization() == origin => url.to_string(),
        Ok(url) => {
            tracing::warn!(next = %url, origin, "cross-origin redirect refused");
            fallback
        }
        Err(e) => {
            tracing::warn!(next, error = %e, "malformed redirect target");
            fallback
        }
    }
}

/// Absolute URL of the auth error page carrying `description`.
#[must_use]
pub fn error_redirect(origin: &str, description: Option<&str>) -> String {
    let description = description.unwrap_or(FALLBACK_ERROR);
    match Url::parse(origin).and_then(|base| base.join(ERROR_PATH)) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("error_description", description);
            url.to_string()
        }
        Err(_) => format!("{origin}{ERROR_PATH}"),
    }
}

/// Exchange the callback's code and decide where to send the browser.
pub async fn handle_callback(backend: &dyn AuthBackend, origin: &str, query: &CallbackQuery) -> CallbackRedirect {
    let Some(code) = query.code.as_deref() else {
        tracing::error!("oauth callback missing code");
        return CallbackRedirect {
            location: error_redirect(origin, query.error_description.as_deref()),
            signed_in: false,
        };
    };

    match backend.exchange_code_for_session(code).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user_id(), "oauth callback completed");
            CallbackRedirect { location: resolve_next(origin, query.next.as_deref()), signed_in: true }
        }
        Err(e) => {
            tracing::error!(error = %e, "oauth code exchange failed");
            CallbackRedirect {
                location: error_redirect(origin, query.error_description.as_deref()),
                signed_in: false,
            }
        }
    }
}

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;
