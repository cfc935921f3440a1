//! Double-submit CSRF protection.
//!
//! A client first fetches a token (delivered both as a readable cookie and in
//! the response body), then echoes it in the `X-CSRF-Token` header on every
//! state-changing request. A cross-site attacker can make the browser send the
//! cookie but cannot read it to forge the header.
//!
//! Tokens are `<nonce>.<issued_at>.<signature>`: a random 32-byte hex nonce,
//! the issue time in Unix seconds, and an HMAC-SHA256 over the first two parts.
//! The signature lets the server reject cookies it never issued and enforce a
//! maximum age without storing anything.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the issued token. Readable by scripts.
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// Header the client echoes the token in.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

const NONCE_BYTES: usize = 32;

/// Tolerated clock skew for tokens stamped slightly in the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub secret: String,
    pub max_age_secs: i64,
}

/// Why a request failed the double-submit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    #[error("CSRF token missing")]
    Missing,

    #[error("CSRF token mismatch")]
    Mismatch,

    #[error("CSRF token expired")]
    Expired,

    #[error("CSRF token invalid")]
    Invalid,
}

/// Issues and checks double-submit tokens.
#[derive(Clone)]
pub struct CsrfGuard {
    key: Vec<u8>,
    max_age_secs: i64,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Self {
        Self {
            key: config.secret.as_bytes().to_vec(),
            max_age_secs: config.max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Issue a fresh token stamped with the current time.
    pub fn issue(&self) -> String {
        self.issue_at(chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, issued_at: i64) -> String {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut nonce);
        let payload = format!("{}.{issued_at}", hex::encode(nonce));
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Check the cookie and header values of one request.
    ///
    /// Order of checks: both present, equal (constant time), signed by this
    /// server, then not older than the configured maximum age.
    pub fn verify(&self, cookie: Option<&str>, header: Option<&str>) -> Result<(), CsrfError> {
        self.verify_at(cookie, header, chrono::Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        cookie: Option<&str>,
        header: Option<&str>,
        now: i64,
    ) -> Result<(), CsrfError> {
        let (cookie, header) = match (cookie, header) {
            (Some(c), Some(h)) if !c.is_empty() && !h.is_empty() => (c, h),
            _ => return Err(CsrfError::Missing),
        };

        if !bool::from(cookie.as_bytes().ct_eq(header.as_bytes())) {
            return Err(CsrfError::Mismatch);
        }

        let (payload, signature) = cookie.rsplit_once('.').ok_or(CsrfError::Invalid)?;
        let (nonce, issued_at) = payload.split_once('.').ok_or(CsrfError::Invalid)?;
        if nonce.len() != NONCE_BYTES * 2 || !nonce.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CsrfError::Invalid);
        }

        let signature = hex::decode(signature).map_err(|_| CsrfError::Invalid)?;
        self.mac(payload)
            .verify_slice(&signature)
            .map_err(|_| CsrfError::Invalid)?;

        let issued_at: i64 = issued_at.parse().map_err(|_| CsrfError::Invalid)?;
        if issued_at > now + MAX_FUTURE_SKEW_SECS {
            return Err(CsrfError::Invalid);
        }
        if now - issued_at > self.max_age_secs {
            return Err(CsrfError::Expired);
        }
        Ok(())
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn guard() -> CsrfGuard {
        CsrfGuard::new(&CsrfConfig {
            secret: "csrf-test-secret".to_string(),
            max_age_secs: 3600,
        })
    }

    #[test]
    fn issued_token_has_three_parts() {
        let token = guard().issue();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 64);
        assert!(parts[1].parse::<i64>().is_ok());
    }

    #[test]
    fn tokens_are_unique() {
        let g = guard();
        assert_ne!(g.issue(), g.issue());
    }

    #[test]
    fn matching_fresh_token_passes() {
        let g = guard();
        let token = g.issue();
        assert_eq!(g.verify(Some(&token), Some(&token)), Ok(()));
    }

    #[test]
    fn absent_or_empty_values_are_missing() {
        let g = guard();
        let token = g.issue();
        assert_matches!(g.verify(None, Some(&token)), Err(CsrfError::Missing));
        assert_matches!(g.verify(Some(&token), None), Err(CsrfError::Missing));
        assert_matches!(g.verify(Some(""), Some("")), Err(CsrfError::Missing));
        assert_matches!(g.verify(None, None), Err(CsrfError::Missing));
    }

    #[test]
    fn different_values_mismatch() {
        let g = guard();
        let a = g.issue();
        let b = g.issue();
        assert_matches!(g.verify(Some(&a), Some(&b)), Err(CsrfError::Mismatch));
    }

    #[test]
    fn token_from_another_key_is_invalid() {
        let other = CsrfGuard::new(&CsrfConfig {
            secret: "someone-else".to_string(),
            max_age_secs: 3600,
        });
        let token = other.issue();
        assert_matches!(guard().verify(Some(&token), Some(&token)), Err(CsrfError::Invalid));
    }

    #[test]
    fn unsigned_value_is_invalid() {
        let g = guard();
        assert_matches!(g.verify(Some("abc"), Some("abc")), Err(CsrfError::Invalid));
        assert_matches!(g.verify(Some("a.b.c"), Some("a.b.c")), Err(CsrfError::Invalid));
    }

    #[test]
    fn tampered_timestamp_is_invalid() {
        let g = guard();
        let token = g.issue_at(1_000);
        let forged = token.replacen(".1000.", ".999999.", 1);
        assert_matches!(
            g.verify_at(Some(&forged), Some(&forged), 1_000),
            Err(CsrfError::Invalid)
        );
    }

    #[test]
    fn old_token_expires() {
        let g = guard();
        let token = g.issue_at(1_000);
        assert_eq!(g.verify_at(Some(&token), Some(&token), 1_000 + 3600), Ok(()));
        assert_matches!(
            g.verify_at(Some(&token), Some(&token), 1_000 + 3601),
            Err(CsrfError::Expired)
        );
    }

    #[test]
    fn far_future_token_is_invalid() {
        let g = guard();
        let token = g.issue_at(10_000);
        assert_matches!(
            g.verify_at(Some(&token), Some(&token), 1_000),
            Err(CsrfError::Invalid)
        );
    }
}
