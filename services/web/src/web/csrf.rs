//! services/web/src/web/csrf.rs
//!
//! Anti-forgery tokens. The edge issues a random token in a cookie; forms echo
//! it back in a `csrf_token` field, and handlers compare the two.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::session::{CookieOptions, SameSite, SetCookie};
use crate::web::state::CsrfToken;

pub const CSRF_COOKIE: &str = "csrf-token";
pub const CSRF_HEADER: &str = "x-csrf-token";
const TOKEN_BYTES: usize = 32;
/// Length of a base64url-encoded token without padding.
const TOKEN_LEN: usize = 43;
const TOKEN_MAX_AGE_SECS: i64 = 24 * 60 * 60;

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `token` could have been produced by `generate_token`.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub fn token_cookie(token: &str, secure: bool) -> SetCookie {
    SetCookie::new(
        CSRF_COOKIE,
        token,
        CookieOptions {
            path: "/".to_string(),
            same_site: SameSite::Strict,
            http_only: true,
            secure,
            max_age: TOKEN_MAX_AGE_SECS,
        },
    )
}

impl CsrfToken {
    /// Constant-time comparison against the token a form submitted.
    pub fn verify(&self, submitted: &str) -> Result<(), ApiError> {
        if self.0.as_bytes().ct_eq(submitted.as_bytes()).into() {
            Ok(())
        } else {
            Err(ApiError::Csrf)
        }
    }
}
