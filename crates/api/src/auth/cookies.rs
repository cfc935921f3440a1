//! Reading the `Cookie` header and building `Set-Cookie` values for the
//! access, refresh, and CSRF cookies.

use axum::http::{header, HeaderMap};

use super::csrf::CSRF_COOKIE_NAME;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// The refresh cookie is only sent to the auth endpoints that consume it
/// (refresh and logout).
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Extract a cookie value by name from every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SameSite {
    Strict,
    Lax,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
        }
    }
}

/// Attributes for the three cookies this service sets.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Add `Secure` to every cookie (production).
    pub secure: bool,
    /// Max-Age of both token cookies.
    pub token_max_age_secs: i64,
    /// Max-Age of the CSRF cookie.
    pub csrf_max_age_secs: i64,
}

impl CookiePolicy {
    /// Access-token cookie. Lives as long as the refresh token so it does not
    /// vanish while a refresh is still possible.
    pub fn access(&self, token: &str) -> String {
        self.build(
            ACCESS_TOKEN_COOKIE,
            token,
            "/",
            self.token_max_age_secs,
            true,
            SameSite::Lax,
        )
    }

    pub fn refresh(&self, token: &str) -> String {
        self.build(
            REFRESH_TOKEN_COOKIE,
            token,
            REFRESH_COOKIE_PATH,
            self.token_max_age_secs,
            true,
            SameSite::Strict,
        )
    }

    /// CSRF cookie. Not HttpOnly: client script must read it to echo it back.
    pub fn csrf(&self, token: &str) -> String {
        self.build(
            CSRF_COOKIE_NAME,
            token,
            "/",
            self.csrf_max_age_secs,
            false,
            SameSite::Strict,
        )
    }

    pub fn clear_access(&self) -> String {
        self.build(ACCESS_TOKEN_COOKIE, "", "/", 0, true, SameSite::Lax)
    }

    pub fn clear_refresh(&self) -> String {
        self.build(
            REFRESH_TOKEN_COOKIE,
            "",
            REFRESH_COOKIE_PATH,
            0,
            true,
            SameSite::Strict,
        )
    }

    fn build(
        &self,
        name: &str,
        value: &str,
        path: &str,
        max_age: i64,
        http_only: bool,
        same_site: SameSite,
    ) -> String {
        let mut cookie = format!(
            "{name}={value}; Path={path}; Max-Age={max_age}; SameSite={}",
            same_site.as_str()
        );
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
