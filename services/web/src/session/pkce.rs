//! services/web/src/session/pkce.rs
//!
//! PKCE verifier/challenge pairs for the email-confirmation flow. The verifier
//! waits in a cookie until the provider redirects back to the auth callback.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::cookies::{CookieOptions, SetCookie};

/// Confirmation emails can sit unread for a while; the verifier has to outlive that.
const VERIFIER_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Cookie holding the verifier, derived from the session cookie name.
pub fn verifier_cookie_name(session_cookie_name: &str) -> String {
    format!("{session_cookie_name}-code-verifier")
}

/// A fresh high-entropy verifier (43 URL-safe characters).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The S256 challenge for `verifier`.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn verifier_cookie(session_cookie_name: &str, verifier: &str, secure: bool) -> SetCookie {
    SetCookie::new(
        verifier_cookie_name(session_cookie_name),
        verifier,
        CookieOptions {
            max_age: VERIFIER_MAX_AGE_SECS,
            ..CookieOptions::session(secure)
        },
    )
}

pub fn verifier_removal(session_cookie_name: &str, secure: bool) -> SetCookie {
    SetCookie::removal(
        verifier_cookie_name(session_cookie_name),
        &CookieOptions::session(secure),
    )
}
