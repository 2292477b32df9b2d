//! Profile editor submission rules.
//!
//! `ProfileForm` holds the raw editor fields. `into_update` normalises them
//! into the column patch the backend expects: values are trimmed, a phone
//! number is mandatory, and blank social links are stored as null.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::client::ClientError;
use crate::error::ErrorCode;
use crate::types::{Profile, ProfileUpdate};

/// Social platforms the editor offers, in display order.
pub const SOCIAL_PLATFORMS: [&str; 3] = ["linkedin", "twitter", "github"];

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Phone number is required.")]
    PhoneRequired,
    #[error("You must be signed in to update your profile.")]
    NotAuthenticated,
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ErrorCode for ProfileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PhoneRequired => "E_PHONE_REQUIRED",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::Timestamp(_) => "E_TIMESTAMP",
            Self::Client(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Client(e) if e.retryable())
    }
}

/// Raw profile editor fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub full_name: String,
    pub phone_number: String,
    pub bio: String,
    pub linkedin: String,
    pub twitter: String,
    pub github: String,
}

impl ProfileForm {
    /// Pre-fill the editor from a cached profile.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        let link = |platform: &str| profile.social_link(platform).unwrap_or_default().to_owned();
        Self {
            full_name: profile.full_name.clone().unwrap_or_default(),
            phone_number: profile.phone_number.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            linkedin: link("linkedin"),
            twitter: link("twitter"),
            github: link("github"),
        }
    }

    /// Validate and build the patch, stamped with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::PhoneRequired` for a blank phone number.
    pub fn into_update(self) -> Result<ProfileUpdate, ProfileError> {
        self.into_update_at(OffsetDateTime::now_utc())
    }

    /// As [`Self::into_update`] with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::PhoneRequired` for a blank phone number.
    pub fn into_update_at(self, now: OffsetDateTime) -> Result<ProfileUpdate, ProfileError> {
        let phone_number = self.phone_number.trim();
        if phone_number.is_empty() {
            return Err(ProfileError::PhoneRequired);
        }

        let links: BTreeMap<String, Option<String>> = SOCIAL_PLATFORMS
            .iter()
            .zip([&self.linkedin, &self.twitter, &self.github])
            .map(|(platform, url)| {
                let url = url.trim();
                ((*platform).to_owned(), (!url.is_empty()).then(|| url.to_owned()))
            })
            .collect();
        let social_links = links.values().any(Option::is_some).then_some(links);

        Ok(ProfileUpdate {
            full_name: self.full_name.trim().to_owned(),
            phone_number: phone_number.to_owned(),
            bio: self.bio.trim().to_owned(),
            social_links,
            updated_at: now.format(&Rfc3339)?,
        })
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
