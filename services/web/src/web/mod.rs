pub mod auth;
pub mod browse;
pub mod csrf;
pub mod extract;
pub mod middleware;
pub mod onboarding;
pub mod rest;
pub mod router;
pub mod settings;
pub mod state;

use axum::response::{IntoResponse, Redirect, Response};

use crate::session::ResponseCookies;
use state::AppState;

// Re-export the router builder for the binary.
pub use router::build_router;

/// 303 to `path` on this site, as form posts expect.
pub(crate) fn see_other(state: &AppState, path: &str) -> Response {
    Redirect::to(state.config.site_link(path).as_str()).into_response()
}

/// Like `see_other`, carrying pending cookie writes.
pub(crate) fn see_other_with_cookies(
    state: &AppState,
    path: &str,
    cookies: &ResponseCookies,
) -> Response {
    let mut response = see_other(state, path);
    cookies.apply_to_response(response.headers_mut());
    response
}
