//! services/web/src/web/middleware.rs
//!
//! The edge layers every page request passes through, outermost first:
//! request id, rate limiting, anti-forgery token issue, and the session gate
//! that refreshes provider cookies and redirects by auth/onboarding state.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use matchmaking_core::access::{self, AccessDecision, RouteKind, Viewer};
use matchmaking_core::RateLimitDecision;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::session::cookies;
use crate::web::csrf::{self, CSRF_COOKIE, CSRF_HEADER};
use crate::web::state::{AppState, AuthContext, CsrfToken, RequestId};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

//=========================================================================================
// Request ID
//=========================================================================================

/// Stamps a fresh correlation id on the request, its tracing span and the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if let Ok(value) = HeaderValue::from_str(&id) {
        req.headers_mut().insert(X_REQUEST_ID, value);
    }
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = info_span!("request", request_id = %id, method = %method, path = %path);
    let mut response = next.run(req).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = response.status();
    let duration_ms = start_time.elapsed().as_millis();
    span.in_scope(|| {
        if status.is_server_error() {
            error!(status = %status, duration_ms, "Request completed with server error");
        } else if status.is_client_error() {
            warn!(status = %status, duration_ms, "Request completed with client error");
        } else {
            info!(status = %status, duration_ms, "Request completed");
        }
    });

    response
}

//=========================================================================================
// Rate limiting
//=========================================================================================

/// Best-effort client address: proxy headers first, then the socket peer.
pub fn client_address(req: &Request) -> String {
    let headers = req.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn set_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}

/// Counts the request against its client's window. Auth form posts use the
/// stricter auth policy. A failing limiter lets the request through.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if access::is_exempt_asset(path) {
        return next.run(req).await;
    }

    let is_auth_post = req.method() == Method::POST && access::classify(path) == RouteKind::Auth;
    let (bucket, policy) = if is_auth_post {
        ("auth", state.config.auth_rate_limit)
    } else {
        ("global", state.config.rate_limit)
    };
    let key = format!("{bucket}:{}", client_address(&req));

    let decision = match state.rate_limiter.check(&key, &policy).await {
        Ok(decision) => decision,
        Err(e) => {
            error!("Rate limiter unavailable, allowing request: {}", e);
            return next.run(req).await;
        }
    };

    if !decision.allowed {
        let retry_after = decision.retry_after_secs(Utc::now());
        warn!(key = %key, retry_after, "Rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many requests. Please try again later.",
                "retryAfter": retry_after,
            })),
        )
            .into_response();
        set_rate_limit_headers(response.headers_mut(), &decision);
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    let mut response = next.run(req).await;
    set_rate_limit_headers(response.headers_mut(), &decision);
    response
}

//=========================================================================================
// Anti-forgery token
//=========================================================================================

/// Makes sure the client holds a CSRF token and hands it to handlers.
pub async fn csrf(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    if access::is_exempt_asset(req.uri().path()) {
        return next.run(req).await;
    }

    let existing = cookies::find(&cookies::parse_cookie_header(req.headers()), CSRF_COOKIE)
        .filter(|token| csrf::is_well_formed(token))
        .map(str::to_string);
    let (token, issued) = match existing {
        Some(token) => (token, false),
        None => (csrf::generate_token(), true),
    };
    req.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = next.run(req).await;

    if issued {
        let cookie = csrf::token_cookie(&token, state.config.cookie_secure);
        if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&token) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CSRF_HEADER), value);
    }
    response
}

//=========================================================================================
// Session gate
//=========================================================================================

/// Refreshes the provider session and routes the viewer by auth/onboarding state.
///
/// The session must be read, verified and its refreshed cookies captured before
/// anything else touches the request; every response, redirects included,
/// carries those cookies.
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if access::is_exempt_asset(&path) {
        return next.run(req).await;
    }
    let route = access::classify(&path);

    let mut session = state.response_session(req.headers());
    let resolved = session.get_user().await;
    let cookies = session.into_store();

    let mut context = AuthContext::default();
    if let Some((user, session)) = resolved {
        context.user = Some(user);
        context.session = Some(session);
    }

    if let (Some(user), true) = (&context.user, route.needs_profile()) {
        context.profile = match state.profiles.get_profile(user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user.id, "Profile lookup failed, treating as not registered: {}", e);
                None
            }
        };
    }

    let viewer = match &context.user {
        None => Viewer::Anonymous,
        Some(_) => Viewer::Authenticated {
            registered: context.profile.as_ref().is_some_and(|p| p.is_registered()),
        },
    };

    let mut response = match access::decide(&path, route, viewer) {
        AccessDecision::Continue => {
            if cookies.is_dirty() {
                cookies.apply_to_request(req.headers_mut());
            }
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        AccessDecision::Login { redirect_to } => {
            debug!(?route, "Anonymous request, redirecting to login");
            let mut location = state.config.site_link(access::LOGIN_PATH);
            location
                .query_pairs_mut()
                .append_pair(access::REDIRECT_TO_PARAM, &redirect_to);
            Redirect::temporary(location.as_str()).into_response()
        }
        AccessDecision::Redirect(target) => {
            debug!(?route, ?viewer, location = target, "Redirecting by onboarding state");
            Redirect::temporary(state.config.site_link(target).as_str()).into_response()
        }
    };

    cookies.apply_to_response(response.headers_mut());
    response
}
