#![allow(dead_code)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use battlecards_db::{MemoryStore, SessionFactory, SessionProvider};
use http_body_util::BodyExt;
use tower::ServiceExt;

use battlecards_api::app::build_app;
use battlecards_api::auth::csrf::CsrfConfig;
use battlecards_api::auth::jwt::JwtConfig;
use battlecards_api::config::ServerConfig;
use battlecards_api::state::AppState;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const FINGERPRINT_SECRET: &str = "integration-fingerprint-secret";

/// Build a test `ServerConfig` with fixed secrets and roomy lifetimes.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        production: false,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_token_expiry_secs: 60,
            refresh_token_expiry_secs: 3600,
        },
        csrf: CsrfConfig {
            secret: "integration-csrf-secret".to_string(),
            max_age_secs: 3600,
        },
        refresh_fingerprint_secret: FINGERPRINT_SECRET.to_string(),
    }
}

/// Build the full application router over a fresh in-memory store.
///
/// Returns the store too so tests can inspect committed state directly.
pub fn build_test_app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let sessions = SessionProvider::new(SessionFactory::Memory(store.clone()));
    let app = build_app(AppState::new(test_config(), sessions));
    (app, store)
}

/// Cookies collected from responses, replayed on later requests.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    values: HashMap<String, String>,
}

impl CookieJar {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Apply every `Set-Cookie` header of a response. Empty values delete.
    pub fn absorb(&mut self, response: &Response) {
        for (name, value) in set_cookies(response) {
            if value.is_empty() {
                self.values.remove(&name);
            } else {
                self.values.insert(name, value);
            }
        }
    }

    fn header(&self) -> Option<String> {
        if self.values.is_empty() {
            return None;
        }
        Some(
            self.values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// `(name, value)` of every `Set-Cookie` header on a response.
pub fn set_cookies(response: &Response) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Full `Set-Cookie` header line for the named cookie.
pub fn set_cookie_line(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Send a request with the jar's cookies and, optionally, an `X-CSRF-Token`.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    jar: &CookieJar,
    csrf_header: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = jar.header() {
        builder = builder.header(COOKIE, cookies);
    }
    if let Some(token) = csrf_header {
        builder = builder.header("x-csrf-token", token);
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Fetch a CSRF token into `jar` and return it for use as the header value.
pub async fn fetch_csrf(app: &Router, jar: &mut CookieJar) -> String {
    let response = send(app, Method::GET, "/api/v1/auth/csrf", jar, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    jar.absorb(&response);
    let json = body_json(response).await;
    json["csrf_token"].as_str().unwrap().to_string()
}

/// POST a JSON body with the jar's cookies and its CSRF token echoed in the header.
pub async fn post_json(
    app: &Router,
    uri: &str,
    jar: &CookieJar,
    body: serde_json::Value,
) -> Response {
    let csrf = jar.get("csrf_token").map(str::to_string);
    send(app, Method::POST, uri, jar, csrf.as_deref(), Some(body)).await
}

/// POST without a body, echoing the jar's CSRF token.
pub async fn post_empty(app: &Router, uri: &str, jar: &CookieJar) -> Response {
    let csrf = jar.get("csrf_token").map(str::to_string);
    send(app, Method::POST, uri, jar, csrf.as_deref(), None).await
}

/// GET with the jar's cookies.
pub async fn get(app: &Router, uri: &str, jar: &CookieJar) -> Response {
    send(app, Method::GET, uri, jar, None, None).await
}

/// Register an account through the API and expect 201.
pub async fn register(app: &Router, jar: &CookieJar, login: &str, password: &str) {
    let body = serde_json::json!({ "login": login, "password": password });
    let response = post_json(app, "/api/v1/auth/registration", jar, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Log in through the API, absorbing the token cookies into `jar`.
pub async fn login(app: &Router, jar: &mut CookieJar, login: &str, password: &str) -> Response {
    let body = serde_json::json!({ "login": login, "password": password });
    let response = post_json(app, "/api/v1/auth/login", jar, body).await;
    jar.absorb(&response);
    response
}

/// Collect the response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
