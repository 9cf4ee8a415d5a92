//! services/web/src/session/server.rs
//!
//! The session helper used by server-side code. It wraps the auth provider client
//! around whatever cookie access the caller has.
//!
//! Handlers that only render data get a read-only view of the request cookies;
//! any cookie write they trigger (e.g. after a token refresh) is dropped, since
//! the edge middleware has already refreshed the session for this request.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::Utc;
use matchmaking_core::{AuthService, AuthSession, AuthUser};
use tracing::{debug, warn};

use super::cookies::{self, CookieOptions, SetCookie};

/// Refresh the access token when it expires within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum CookieWriteError {
    #[error("cookies cannot be modified in this context")]
    ReadOnly,
}

/// Cookie access for the session helper.
pub trait CookieStore: Send {
    /// Every cookie visible to the current request, including pending writes.
    fn get_all(&self) -> Vec<(String, String)>;

    fn set_all(&mut self, cookies: Vec<SetCookie>) -> Result<(), CookieWriteError>;
}

/// The request's cookies, with no way to write back.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyCookies {
    cookies: Vec<(String, String)>,
}

impl ReadOnlyCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookies: cookies::parse_cookie_header(headers),
        }
    }
}

impl CookieStore for ReadOnlyCookies {
    fn get_all(&self) -> Vec<(String, String)> {
        self.cookies.clone()
    }

    fn set_all(&mut self, _cookies: Vec<SetCookie>) -> Result<(), CookieWriteError> {
        Err(CookieWriteError::ReadOnly)
    }
}

/// Request cookies plus a buffer of writes destined for the response.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    request: Vec<(String, String)>,
    pending: Vec<SetCookie>,
}

impl ResponseCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request: cookies::parse_cookie_header(headers),
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[SetCookie] {
        &self.pending
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queues a single write, replacing any earlier write to the same cookie.
    pub fn push(&mut self, cookie: SetCookie) {
        self.pending.retain(|c| c.name != cookie.name);
        self.pending.push(cookie);
    }

    /// Appends pending writes as `Set-Cookie` headers. A cookie the response
    /// already sets is left alone: handlers write from the newer state.
    pub fn apply_to_response(&self, headers: &mut HeaderMap) {
        let already_set: Vec<String> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim().to_string()))
            .collect();
        for cookie in self.pending.iter().filter(|c| !already_set.contains(&c.name)) {
            match HeaderValue::from_str(&cookie.to_header_value()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => warn!("Dropping unrepresentable cookie {}: {}", cookie.name, e),
            }
        }
    }

    /// Rewrites the request `Cookie` header so downstream handlers see the
    /// cookies as they will be after this response.
    pub fn apply_to_request(&self, headers: &mut HeaderMap) {
        let current = self.get_all();
        headers.remove(header::COOKIE);
        if current.is_empty() {
            return;
        }
        match HeaderValue::from_str(&cookies::render_cookie_header(&current)) {
            Ok(value) => {
                headers.insert(header::COOKIE, value);
            }
            Err(e) => warn!("Could not rewrite request cookies: {}", e),
        }
    }
}

impl CookieStore for ResponseCookies {
    fn get_all(&self) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = self
            .request
            .iter()
            .filter(|(name, _)| !self.pending.iter().any(|c| &c.name == name))
            .cloned()
            .collect();
        merged.extend(
            self.pending
                .iter()
                .filter(|c| !c.is_removal())
                .map(|c| (c.name.clone(), c.value.clone())),
        );
        merged
    }

    fn set_all(&mut self, cookies: Vec<SetCookie>) -> Result<(), CookieWriteError> {
        for cookie in cookies {
            self.push(cookie);
        }
        Ok(())
    }
}

/// Per-request session access on top of the auth provider client.
pub struct ServerSession<'a, C: CookieStore> {
    auth: &'a dyn AuthService,
    store: C,
    cookie_name: String,
    options: CookieOptions,
}

impl<'a, C: CookieStore> ServerSession<'a, C> {
    pub fn new(
        auth: &'a dyn AuthService,
        store: C,
        cookie_name: impl Into<String>,
        options: CookieOptions,
    ) -> Self {
        Self {
            auth,
            store,
            cookie_name: cookie_name.into(),
            options,
        }
    }

    /// The session as stored in cookies, without contacting the provider.
    pub fn stored_session(&self) -> Option<AuthSession> {
        cookies::decode_session(&self.store.get_all(), &self.cookie_name)
    }

    /// The current session, refreshed first if its access token is about to expire.
    /// A failed refresh clears the session cookies.
    pub async fn get_session(&mut self) -> Option<AuthSession> {
        let session = self.stored_session()?;
        if !session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
            return Some(session);
        }

        debug!("Access token expiring, refreshing session");
        match self.auth.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                self.set_session(&refreshed);
                Some(refreshed)
            }
            Err(e) => {
                debug!("Session refresh failed, treating as signed out: {}", e);
                self.clear();
                None
            }
        }
    }

    /// Verifies the session with the provider. Any failure reads as "no user".
    pub async fn get_user(&mut self) -> Option<(AuthUser, AuthSession)> {
        let session = self.get_session().await?;
        match self.auth.get_user(&session.access_token).await {
            Ok(user) => Some((user, session)),
            Err(e) => {
                debug!("Session token rejected by auth provider: {}", e);
                None
            }
        }
    }

    pub fn set_session(&mut self, session: &AuthSession) {
        let writes = cookies::session_writes(
            &self.store.get_all(),
            &self.cookie_name,
            Some(session),
            &self.options,
        );
        self.write(writes);
    }

    pub fn clear(&mut self) {
        let writes =
            cookies::session_writes(&self.store.get_all(), &self.cookie_name, None, &self.options);
        self.write(writes);
    }

    fn write(&mut self, writes: Vec<SetCookie>) {
        if writes.is_empty() {
            return;
        }
        // Expected when called from a read-only context; the middleware owns refreshes.
        if let Err(e) = self.store.set_all(writes) {
            debug!("Skipping session cookie write: {}", e);
        }
    }

    pub fn into_store(self) -> C {
        self.store
    }
}
