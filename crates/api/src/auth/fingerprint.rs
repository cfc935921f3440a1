//! Keyed fingerprints of refresh tokens.
//!
//! The server stores one fingerprint per user instead of the refresh token
//! itself. A presented refresh token is accepted only if its fingerprint equals
//! the stored one, which makes every refresh token single-use: each successful
//! login or refresh overwrites the stored value.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 fingerprinting keyed with a server-side secret, so a leaked
/// `users` table cannot be used to confirm guessed tokens.
#[derive(Clone)]
pub struct RefreshFingerprinter {
    key: Vec<u8>,
}

impl std::fmt::Debug for RefreshFingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshFingerprinter").finish_non_exhaustive()
    }
}

impl RefreshFingerprinter {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Hex-encoded fingerprint of `token`. Deterministic for a given key.
    pub fn fingerprint(&self, token: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether `token` fingerprints to `stored`, compared in constant time.
    pub fn matches(&self, token: &str, stored: &str) -> bool {
        let candidate = self.fingerprint(token);
        candidate.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}
