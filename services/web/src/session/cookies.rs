//! services/web/src/session/cookies.rs
//!
//! Reading and writing the provider's `sb-` session cookies.
//!
//! A session is stored as `base64-` followed by the base64url-encoded JSON of the
//! session. Browsers cap cookie size, so long values are split across
//! `<name>.0`, `<name>.1`, ... and stitched back together on read.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use matchmaking_core::AuthSession;
use std::fmt;
use tracing::debug;

/// Largest value written into a single cookie before chunking kicks in.
pub const MAX_CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";
/// 400 days, the longest lifetime browsers honour.
pub const DEFAULT_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub same_site: SameSite,
    pub http_only: bool,
    pub secure: bool,
    pub max_age: i64,
}

impl CookieOptions {
    /// Attributes used for the provider session cookies.
    pub fn session(secure: bool) -> Self {
        Self {
            path: "/".to_string(),
            same_site: SameSite::Lax,
            http_only: true,
            secure,
            max_age: DEFAULT_MAX_AGE_SECS,
        }
    }

    fn expired(&self) -> Self {
        Self {
            max_age: 0,
            ..self.clone()
        }
    }
}

/// One pending `Set-Cookie` write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// A write that tells the browser to drop `name`.
    pub fn removal(name: impl Into<String>, options: &CookieOptions) -> Self {
        Self::new(name, "", options.expired())
    }

    pub fn is_removal(&self) -> bool {
        self.options.max_age <= 0
    }

    pub fn to_header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name, self.value, self.options.path, self.options.max_age, self.options.same_site
        );
        if self.options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.options.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// All `name=value` pairs from every `Cookie` header, in order.
pub fn parse_cookie_header(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Renders pairs back into a single `Cookie` request header value.
pub fn render_cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn find<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}.{index}")
}

/// Whether `candidate` is `name` itself or one of its chunks.
fn belongs_to(candidate: &str, name: &str) -> bool {
    candidate == name
        || candidate
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Names of `name` and all its chunk cookies currently present.
pub fn session_cookie_names(cookies: &[(String, String)], name: &str) -> Vec<String> {
    cookies
        .iter()
        .filter(|(n, _)| belongs_to(n, name))
        .map(|(n, _)| n.clone())
        .collect()
}

/// Reassembles the raw (possibly chunked) value stored under `name`.
fn combined_value(cookies: &[(String, String)], name: &str) -> Option<String> {
    if let Some(value) = find(cookies, name) {
        return Some(value.to_string());
    }
    let mut combined = String::new();
    for index in 0.. {
        match find(cookies, &chunk_name(name, index)) {
            Some(chunk) => combined.push_str(chunk),
            None => break,
        }
    }
    (!combined.is_empty()).then_some(combined)
}

/// Reads the session stored under `name`. Malformed values read as no session.
pub fn decode_session(cookies: &[(String, String)], name: &str) -> Option<AuthSession> {
    let raw = combined_value(cookies, name)?;
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => match URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Ignoring session cookie with invalid base64: {}", e);
                return None;
            }
        },
        None => raw.into_bytes(),
    };
    serde_json::from_slice(&json)
        .map_err(|e| debug!("Ignoring session cookie with invalid JSON: {}", e))
        .ok()
}

fn split_value(value: &str) -> Vec<&str> {
    // The value is base64url plus an ASCII prefix, so byte offsets are char boundaries.
    value
        .as_bytes()
        .chunks(MAX_CHUNK_SIZE)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect()
}

/// The writes needed to store `session` under `name` (or to clear it when
/// `None`), including removals of stale chunks listed in `existing`.
pub fn session_writes(
    existing: &[(String, String)],
    name: &str,
    session: Option<&AuthSession>,
    options: &CookieOptions,
) -> Vec<SetCookie> {
    let mut writes = Vec::new();
    let mut keep: Vec<String> = Vec::new();

    if let Some(session) = session {
        match serde_json::to_vec(session) {
            Ok(json) => {
                let value = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json));
                if value.len() <= MAX_CHUNK_SIZE {
                    writes.push(SetCookie::new(name, value, options.clone()));
                    keep.push(name.to_string());
                } else {
                    for (index, chunk) in split_value(&value).into_iter().enumerate() {
                        let chunk_cookie = chunk_name(name, index);
                        writes.push(SetCookie::new(chunk_cookie.clone(), chunk, options.clone()));
                        keep.push(chunk_cookie);
                    }
                }
            }
            Err(e) => debug!("Failed to serialise session for cookie storage: {}", e),
        }
    }

    for stale in session_cookie_names(existing, name) {
        if !keep.contains(&stale) {
            writes.push(SetCookie::removal(stale, options));
        }
    }
    writes
}
