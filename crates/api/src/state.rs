use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use userhub_db::timeout::{TimeoutOtpStore, TimeoutSessionStore, TimeoutUserStore};
use userhub_db::{OtpStore, SessionStore, UserStore};

use crate::auth::jwt::TokenService;
use crate::background::session_cleanup::SessionCleanup;
use crate::config::ServerConfig;
use crate::notifications::mailer::Mailer;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub otps: Arc<dyn OtpStore>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<TokenService>,
    /// Shares `sessions` with the request path.
    pub cleanup: Arc<SessionCleanup>,
    /// Signs the server-session cookie.
    pub cookie_key: Key,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the stores behind per-call timeouts and build the services that
    /// depend on configuration.
    pub fn new(
        config: ServerConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        otps: Arc<dyn OtpStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let limit = Duration::from_secs(config.session.store_timeout_secs);
        let sessions: Arc<dyn SessionStore> = Arc::new(TimeoutSessionStore::new(sessions, limit));
        let users: Arc<dyn UserStore> = Arc::new(TimeoutUserStore::new(users, limit));
        let otps: Arc<dyn OtpStore> = Arc::new(TimeoutOtpStore::new(otps, limit));

        let tokens = Arc::new(TokenService::new(&config.jwt, config.session.lifetime_days));
        let cleanup = Arc::new(SessionCleanup::new(Arc::clone(&sessions)));
        let cookie_key = derive_cookie_key(&config.session.secret);

        Self {
            sessions,
            users,
            otps,
            mailer,
            tokens,
            cleanup,
            cookie_key,
            config: Arc::new(config),
        }
    }
}

/// Stretch the configured secret to the 64 bytes a cookie [`Key`] needs.
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
