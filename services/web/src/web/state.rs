//! services/web/src/web/state.rs
//!
//! Defines the application's shared state and the per-request context the edge
//! middleware hands to handlers.

use crate::config::Config;
use crate::session::{CookieOptions, ReadOnlyCookies, ResponseCookies, ServerSession};
use axum::http::HeaderMap;
use matchmaking_core::ports::{AdminAuthService, AuthService, ProfileRepository, RateLimiter};
use matchmaking_core::{AuthSession, AuthUser, Profile};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthService>,
    pub admin: Arc<dyn AdminAuthService>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn session_cookie_name(&self) -> String {
        self.config.session_cookie_name()
    }

    pub fn session_cookie_options(&self) -> CookieOptions {
        CookieOptions::session(self.config.cookie_secure)
    }

    /// A session helper over the request's cookies. Writes through it are dropped.
    pub fn read_only_session(&self, headers: &HeaderMap) -> ServerSession<'_, ReadOnlyCookies> {
        ServerSession::new(
            self.auth.as_ref(),
            ReadOnlyCookies::from_headers(headers),
            self.session_cookie_name(),
            self.session_cookie_options(),
        )
    }

    /// A session helper whose cookie writes are buffered for the response.
    pub fn response_session(&self, headers: &HeaderMap) -> ServerSession<'_, ResponseCookies> {
        ServerSession::new(
            self.auth.as_ref(),
            ResponseCookies::from_headers(headers),
            self.session_cookie_name(),
            self.session_cookie_options(),
        )
    }
}

//=========================================================================================
// Per-request context
//=========================================================================================

/// Identifier stamped on every request and echoed as `X-Request-ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// The anti-forgery token issued (or confirmed) for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// What the session gate learned about the viewer.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
    pub profile: Option<Profile>,
}
