//! Backend configuration parsed from environment variables.

use std::path::PathBuf;

use reqwest::Url;

use crate::error::ErrorCode;

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Path the OAuth provider returns to after authorization.
pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Connection settings for the hosted auth/data backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL, without trailing slash.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Origin of the web app, used to build the OAuth return URL.
    pub site_url: String,
    /// Where the current session is persisted between runs, if anywhere.
    pub session_file: Option<PathBuf>,
    pub timeouts: HttpTimeouts,
}

impl BackendConfig {
    /// Config with defaults for everything but the project URL and key.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute http(s) URL.
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_base_url("SUPABASE_URL", url)?,
            anon_key: anon_key.into(),
            site_url: DEFAULT_SITE_URL.to_owned(),
            session_file: None,
            timeouts: HttpTimeouts::default(),
        })
    }

    /// Build typed backend config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `LMS_SITE_URL`: default `http://localhost:3000`
    /// - `LMS_SESSION_FILE`: session persistence path, none when absent
    /// - `LMS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `LMS_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a URL is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing { var: "SUPABASE_URL" })?;
        let anon_key =
            std::env::var("SUPABASE_ANON_KEY").map_err(|_| ConfigError::Missing { var: "SUPABASE_ANON_KEY" })?;
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Missing { var: "SUPABASE_ANON_KEY" });
        }

        let site_url = match std::env::var("LMS_SITE_URL") {
            Ok(raw) => parse_base_url("LMS_SITE_URL", &raw)?,
            Err(_) => DEFAULT_SITE_URL.to_owned(),
        };
        let session_file = std::env::var("LMS_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("LMS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("LMS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { url: parse_base_url("SUPABASE_URL", &url)?, anon_key, site_url, session_file, timeouts })
    }

    /// Replace the web app origin used for OAuth return URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if `site_url` is not an absolute http(s) URL.
    pub fn with_site_url(mut self, site_url: &str) -> Result<Self, ConfigError> {
        self.site_url = parse_base_url("LMS_SITE_URL", site_url)?;
        Ok(self)
    }

    /// OAuth return URL: `<site_url>/auth/callback`.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.site_url)
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_base_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = || ConfigError::Invalid { var, value: raw.to_owned() };
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
