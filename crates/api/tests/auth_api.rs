//! HTTP-level integration tests for the `/auth` endpoints.
//!
//! Tests cover CSRF issuance and enforcement, registration, login, token
//! rotation with replay rejection, logout, and current-user resolution, all
//! against the in-memory session backend.

mod common;

use axum::http::{Method, StatusCode};
use battlecards_api::auth::fingerprint::RefreshFingerprinter;
use battlecards_api::auth::jwt::{JwtConfig, TokenService};
use common::{
    body_json, fetch_csrf, get, login, post_empty, post_json, register, send, set_cookie_line,
    CookieJar,
};

/// A jar holding a fresh CSRF cookie, plus the token for the header.
async fn anonymous(app: &axum::Router) -> CookieJar {
    let mut jar = CookieJar::default();
    fetch_csrf(app, &mut jar).await;
    jar
}

// ---------------------------------------------------------------------------
// CSRF
// ---------------------------------------------------------------------------

/// The CSRF cookie is script-readable, strict, and matches the body.
#[tokio::test]
async fn csrf_endpoint_sets_readable_cookie() {
    let (app, _store) = common::build_test_app();
    let response = get(&app, "/api/v1/auth/csrf", &CookieJar::default()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let line = set_cookie_line(&response, "csrf_token").expect("csrf cookie must be set");
    assert!(line.contains("SameSite=Strict"));
    assert!(!line.contains("HttpOnly"));

    let cookie_value = line["csrf_token=".len()..].split(';').next().unwrap().to_string();
    let json = body_json(response).await;
    assert_eq!(json["csrf_token"], cookie_value);
}

/// Mutating endpoints answer 403 when the header is missing.
#[tokio::test]
async fn mutating_requests_without_csrf_header_are_forbidden() {
    let (app, _store) = common::build_test_app();
    let jar = anonymous(&app).await;
    let body = serde_json::json!({ "login": "alice", "password": "pw1" });

    for uri in ["/api/v1/auth/login", "/api/v1/auth/registration"] {
        let response = send(&app, Method::POST, uri, &jar, None, Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "CSRF_REJECTED");
    }

    for uri in ["/api/v1/auth/refresh", "/api/v1/auth/logout"] {
        let response = send(&app, Method::POST, uri, &jar, None, None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

/// A header that differs from the cookie is rejected.
#[tokio::test]
async fn mismatched_csrf_header_is_forbidden() {
    let (app, _store) = common::build_test_app();
    let jar = anonymous(&app).await;
    let mut other = CookieJar::default();
    let foreign = fetch_csrf(&app, &mut other).await;

    let body = serde_json::json!({ "login": "alice", "password": "pw1" });
    let response = send(
        &app,
        Method::POST,
        "/api/v1/auth/registration",
        &jar,
        Some(&foreign),
        Some(body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A second registration with the same login is a 409 and creates nothing.
#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, store) = common::build_test_app();
    let jar = anonymous(&app).await;

    register(&app, &jar, "alice", "pw1").await;

    let body = serde_json::json!({ "login": "alice", "password": "other" });
    let response = post_json(&app, "/api/v1/auth/registration", &jar, body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");

    assert_eq!(store.user_count().await, 1);
    let user = store.user_by_login("alice").await.unwrap();
    assert!(user.refresh_token_hash.is_none());
    assert_eq!(user.role, "player");
}

/// Registration returns the public user view without secrets.
#[tokio::test]
async fn registration_returns_public_user() {
    let (app, _store) = common::build_test_app();
    let jar = anonymous(&app).await;

    let body = serde_json::json!({ "login": "bob", "password": "pw1", "email": "bob@example.com" });
    let response = post_json(&app, "/api/v1/auth/registration", &jar, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["login"], "bob");
    assert_eq!(json["email"], "bob@example.com");
    assert_eq!(json["language"], "RU");
    assert!(json.get("password_hash").is_none());
    assert!(json.get("refresh_token_hash").is_none());
}

/// Over-long logins are a 400.
#[tokio::test]
async fn invalid_registration_is_bad_request() {
    let (app, store) = common::build_test_app();
    let jar = anonymous(&app).await;

    let body = serde_json::json!({ "login": "x".repeat(33), "password": "pw1" });
    let response = post_json(&app, "/api/v1/auth/registration", &jar, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(store.user_count().await, 0);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Unknown login and wrong password produce the same 401 body.
#[tokio::test]
async fn failed_logins_are_indistinguishable() {
    let (app, _store) = common::build_test_app();
    let mut jar = anonymous(&app).await;

    let unknown = login(&app, &mut jar, "alice", "pw1").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;

    register(&app, &jar, "alice", "pw1").await;
    let wrong = login(&app, &mut jar, "alice", "wrong").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;

    assert_eq!(unknown, wrong);
    assert!(jar.get("access_token").is_none());
}

/// Login sets both token cookies and stores the refresh token's fingerprint.
#[tokio::test]
async fn login_stores_refresh_fingerprint() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;

    let response = login(&app, &mut jar, "alice", "pw1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let refresh_line = set_cookie_line(&response, "refresh_token").unwrap();
    assert!(refresh_line.contains("HttpOnly"));
    assert!(refresh_line.contains("Path=/api/v1/auth"));
    assert!(refresh_line.contains("Max-Age=3600"));
    let access_line = set_cookie_line(&response, "access_token").unwrap();
    assert!(access_line.contains("Max-Age=3600"));

    let json = body_json(response).await;
    assert_eq!(json["user"]["login"], "alice");
    assert_eq!(json["expires_in"], 60);

    let refresh_token = jar.get("refresh_token").unwrap();
    let expected = RefreshFingerprinter::new(common::FINGERPRINT_SECRET).fingerprint(refresh_token);
    let user = store.user_by_login("alice").await.unwrap();
    assert_eq!(user.refresh_token_hash.as_deref(), Some(expected.as_str()));
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Refresh issues a new pair; the superseded refresh token is then rejected.
#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;

    let original = jar.clone();
    let fingerprint_before = store.user_by_login("alice").await.unwrap().refresh_token_hash;

    let response = post_empty(&app, "/api/v1/auth/refresh", &jar).await;
    assert_eq!(response.status(), StatusCode::OK);
    jar.absorb(&response);
    assert_ne!(jar.get("refresh_token"), original.get("refresh_token"));

    let fingerprint_after = store.user_by_login("alice").await.unwrap().refresh_token_hash;
    assert!(fingerprint_after.is_some());
    assert_ne!(fingerprint_before, fingerprint_after);

    let replay = post_empty(&app, "/api/v1/auth/refresh", &original).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // The rotated pair still works.
    let again = post_empty(&app, "/api/v1/auth/refresh", &jar).await;
    assert_eq!(again.status(), StatusCode::OK);
}

/// Two refreshes racing on the same pair: exactly one is accepted.
#[tokio::test]
async fn concurrent_refreshes_accept_one() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;

    let (a, b) = tokio::join!(
        post_empty(&app, "/api/v1/auth/refresh", &jar),
        post_empty(&app, "/api/v1/auth/refresh", &jar),
    );
    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);

    let winner = if a.status() == StatusCode::OK { a } else { b };
    let mut rotated = jar.clone();
    rotated.absorb(&winner);
    let stored = store
        .user_by_login("alice")
        .await
        .unwrap()
        .refresh_token_hash
        .unwrap();
    let fingerprints = RefreshFingerprinter::new(common::FINGERPRINT_SECRET);
    assert!(fingerprints.matches(rotated.get("refresh_token").unwrap(), &stored));
}

/// Refresh requires both token cookies.
#[tokio::test]
async fn refresh_without_both_tokens_is_unauthorized() {
    let (app, _store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;

    let mut no_access = jar.clone();
    no_access.remove("access_token");
    let response = post_empty(&app, "/api/v1/auth/refresh", &no_access).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut no_refresh = jar.clone();
    no_refresh.remove("refresh_token");
    let response = post_empty(&app, "/api/v1/auth/refresh", &no_refresh).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// An access token from one user cannot be paired with another's refresh token.
#[tokio::test]
async fn refresh_rejects_token_substitution() {
    let (app, _store) = common::build_test_app();
    let mut alice = anonymous(&app).await;
    let mut bob = anonymous(&app).await;
    register(&app, &alice, "alice", "pw1").await;
    register(&app, &bob, "bob", "pw2").await;
    login(&app, &mut alice, "alice", "pw1").await;
    login(&app, &mut bob, "bob", "pw2").await;

    let mut mixed = alice.clone();
    mixed.set("refresh_token", bob.get("refresh_token").unwrap());
    let response = post_empty(&app, "/api/v1/auth/refresh", &mixed).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// An access token that has already expired can still be refreshed.
#[tokio::test]
async fn refresh_accepts_expired_access_token() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;

    let user = store.user_by_login("alice").await.unwrap();
    let expired = TokenService::new(&JwtConfig {
        secret: common::JWT_SECRET.to_string(),
        access_token_expiry_secs: -60,
        refresh_token_expiry_secs: -60,
    })
    .issue_access_token(user.id)
    .unwrap();
    jar.set("access_token", &expired);

    let response = post_empty(&app, "/api/v1/auth/refresh", &jar).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// Logout clears the stored fingerprint and both cookies; refresh then fails.
#[tokio::test]
async fn logout_revokes_refresh_token() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;
    let before_logout = jar.clone();

    let response = post_empty(&app, "/api/v1/auth/logout", &jar).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let access_line = set_cookie_line(&response, "access_token").unwrap();
    assert!(access_line.contains("Max-Age=0"));
    let refresh_line = set_cookie_line(&response, "refresh_token").unwrap();
    assert!(refresh_line.contains("Max-Age=0"));
    jar.absorb(&response);
    assert!(jar.get("access_token").is_none());
    assert!(jar.get("refresh_token").is_none());

    let user = store.user_by_login("alice").await.unwrap();
    assert!(user.refresh_token_hash.is_none());

    let response = post_empty(&app, "/api/v1/auth/refresh", &before_logout).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Logout succeeds with no token cookies and with garbage ones.
#[tokio::test]
async fn logout_always_succeeds() {
    let (app, _store) = common::build_test_app();
    let mut jar = anonymous(&app).await;

    let response = post_empty(&app, "/api/v1/auth/logout", &jar).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    jar.set("refresh_token", "not-a-token");
    let response = post_empty(&app, "/api/v1/auth/logout", &jar).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// ---------------------------------------------------------------------------
// Current user
// ---------------------------------------------------------------------------

/// `/me` resolves the logged-in user from the access cookie.
#[tokio::test]
async fn me_returns_current_user() {
    let (app, _store) = common::build_test_app();
    let mut jar = anonymous(&app).await;
    register(&app, &jar, "alice", "pw1").await;
    login(&app, &mut jar, "alice", "pw1").await;

    let response = get(&app, "/api/v1/auth/me", &jar).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["login"], "alice");
    assert_eq!(json["role"], "player");
}

/// `/me` without a cookie, with a forged token, or with an expired one is 401.
#[tokio::test]
async fn me_rejects_missing_forged_and_expired_tokens() {
    let (app, store) = common::build_test_app();
    let mut jar = anonymous(&app).await;

    let response = get(&app, "/api/v1/auth/me", &jar).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    jar.set("access_token", "forged");
    let response = get(&app, "/api/v1/auth/me", &jar).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    register(&app, &jar, "alice", "pw1").await;
    let user = store.user_by_login("alice").await.unwrap();
    let expired = TokenService::new(&JwtConfig {
        secret: common::JWT_SECRET.to_string(),
        access_token_expiry_secs: -60,
        refresh_token_expiry_secs: -60,
    })
    .issue_access_token(user.id)
    .unwrap();
    jar.set("access_token", &expired);

    let response = get(&app, "/api/v1/auth/me", &jar).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "TOKEN_EXPIRED");
}
