//! services/web/src/session/mod.rs
//!
//! Provider session handling: the `sb-` cookie format, PKCE verifiers and the
//! per-request session helper.

pub mod cookies;
pub mod pkce;
pub mod server;

pub use cookies::{CookieOptions, SameSite, SetCookie};
pub use server::{CookieStore, ReadOnlyCookies, ResponseCookies, ServerSession};
