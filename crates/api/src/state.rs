use std::sync::Arc;

use battlecards_db::SessionProvider;

use crate::auth::cookies::CookiePolicy;
use crate::auth::AuthService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Hands out one fresh database session per unit of work.
    pub sessions: Arc<SessionProvider>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Authentication flows.
    pub auth: Arc<AuthService>,
    /// Attributes for the cookies set by the auth handlers.
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Wire the auth stack from configuration on top of a session provider.
    pub fn new(config: ServerConfig, sessions: SessionProvider) -> Self {
        let auth = AuthService::new(
            crate::auth::jwt::TokenService::new(&config.jwt),
            crate::auth::fingerprint::RefreshFingerprinter::new(
                &config.refresh_fingerprint_secret,
            ),
            crate::auth::csrf::CsrfGuard::new(&config.csrf),
        );
        Self {
            sessions: Arc::new(sessions),
            cookies: config.cookie_policy(),
            config: Arc::new(config),
            auth: Arc::new(auth),
        }
    }
}
