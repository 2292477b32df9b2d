//! PKCE verifier/challenge generation for the OAuth code flow.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Challenge method sent to the authorize endpoint.
pub const CHALLENGE_METHOD: &str = "s256";

/// Verifier/challenge pair for one OAuth round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Random 32-byte verifier, base64url encoded (43 chars).
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::rng().random();
        let verifier = Base64UrlUnpadded::encode_string(&bytes);
        let challenge = challenge_for(&verifier);
        Self { verifier, challenge }
    }
}

/// S256 challenge: base64url(sha256(verifier)).
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

#[cfg(test)]
#[path = "pkce_test.rs"]
mod tests;
