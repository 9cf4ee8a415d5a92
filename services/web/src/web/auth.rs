//! services/web/src/web/auth.rs
//!
//! Sign-in, registration, the provider's email-confirmation callback and
//! sign-out. Sessions live in the provider's `sb-` cookies; nothing here stores
//! credentials itself.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use matchmaking_core::access::{
    safe_redirect_target, AUTH_CALLBACK_PATH, BROWSE_PATH, LOGIN_PATH, ONBOARDING_PATH,
};
use matchmaking_core::{AuthSession, PortError, SignUpRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::forms::{LoginForm, LogoutForm, RegistrationForm};
use crate::session::{cookies, pkce};
use crate::web::see_other_with_cookies;
use crate::web::state::{AppState, CsrfToken};

/// Query flag the callback sets when the code exchange fails.
pub const CALLBACK_FAILED: &str = "auth_callback_failed";

/// A redirect target that stays on this site, or `fallback`.
fn local_target<'a>(state: &AppState, candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    let target = safe_redirect_target(candidate, fallback);
    if state.config.is_on_site(target) {
        target
    } else {
        warn!(location = target, "Redirect target resolves off-site, using fallback");
        fallback
    }
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthPageQuery {
    #[serde(rename = "redirectTo", alias = "redirect_to")]
    pub redirect_to: Option<String>,
    pub error: Option<String>,
}

/// What the login and registration pages render with.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthPage {
    pub csrf_token: String,
    /// Same-site path to continue to after signing in.
    pub redirect_to: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationPending {
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
    pub error_description: Option<String>,
}

fn auth_page(csrf: CsrfToken, query: AuthPageQuery) -> Json<AuthPage> {
    let redirect_to = query
        .redirect_to
        .as_deref()
        .map(|target| safe_redirect_target(Some(target), BROWSE_PATH).to_string());
    Json(AuthPage {
        csrf_token: csrf.0,
        redirect_to,
        error: query.error,
    })
}

/// Creates the empty profile row for a newly signed-in user. Failures are
/// logged only; onboarding creates the row again if it is still missing.
async fn ensure_profile_for(state: &AppState, session: &AuthSession) {
    let user_id: Option<Uuid> = match &session.user {
        Some(user) => Some(user.id),
        None => match state.auth.get_user(&session.access_token).await {
            Ok(user) => Some(user.id),
            Err(e) => {
                warn!("Could not resolve user for new session: {}", e);
                None
            }
        },
    };
    if let Some(user_id) = user_id {
        if let Err(e) = state.profiles.ensure_profile(user_id).await {
            error!(%user_id, "Failed to create profile row: {:?}", e);
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /login - Login page props
#[utoipa::path(
    get,
    path = "/login",
    params(AuthPageQuery),
    responses(
        (status = 200, description = "Login page", body = AuthPage),
        (status = 307, description = "Already signed in")
    )
)]
pub async fn login_page(csrf: CsrfToken, Query(query): Query<AuthPageQuery>) -> Json<AuthPage> {
    auth_page(csrf, query)
}

/// GET /register - Registration page props
#[utoipa::path(
    get,
    path = "/register",
    params(AuthPageQuery),
    responses(
        (status = 200, description = "Registration page", body = AuthPage),
        (status = 307, description = "Already signed in")
    )
)]
pub async fn register_page(csrf: CsrfToken, Query(query): Query<AuthPageQuery>) -> Json<AuthPage> {
    auth_page(csrf, query)
}

/// POST /login - Sign in with email and password
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in; redirects to `redirectTo` or /browse"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    csrf: CsrfToken,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    form.validate()?;

    let session = state
        .auth
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => {
                ApiError::Unauthorized("Invalid email or password.".to_string())
            }
            other => other.into(),
        })?;
    info!(user_id = ?session.user.as_ref().map(|u| u.id), "User signed in");

    let mut server_session = state.response_session(&headers);
    server_session.set_session(&session);
    let cookies = server_session.into_store();

    let target = local_target(&state, form.redirect_to.as_deref(), BROWSE_PATH);
    Ok(see_other_with_cookies(&state, target, &cookies))
}

/// POST /register - Create an account
///
/// When the provider confirms by email, no session is returned yet: the PKCE
/// verifier is kept in a cookie for the callback and the response is 202.
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegistrationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 202, description = "Confirmation email sent", body = RegistrationPending),
        (status = 303, description = "Signed up and signed in; redirects to /onboarding"),
        (status = 400, description = "Rejected by the auth provider"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    csrf: CsrfToken,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    form.validate()?;

    let verifier = pkce::generate_verifier();
    let outcome = state
        .auth
        .sign_up(SignUpRequest {
            email: form.email.trim().to_string(),
            password: form.password,
            email_redirect_to: state.config.site_link(AUTH_CALLBACK_PATH).to_string(),
            code_challenge: pkce::challenge_for(&verifier),
        })
        .await?;

    let cookie_name = state.session_cookie_name();
    let mut server_session = state.response_session(&headers);

    match outcome.session {
        Some(session) => {
            info!(user_id = ?outcome.user.as_ref().map(|u| u.id), "User registered with immediate session");
            server_session.set_session(&session);
            ensure_profile_for(&state, &session).await;
            let cookies = server_session.into_store();
            Ok(see_other_with_cookies(&state, ONBOARDING_PATH, &cookies))
        }
        None => {
            info!(user_id = ?outcome.user.as_ref().map(|u| u.id), "User registered, awaiting email confirmation");
            let mut cookies = server_session.into_store();
            cookies.push(pkce::verifier_cookie(
                &cookie_name,
                &verifier,
                state.config.cookie_secure,
            ));
            let mut response = (
                StatusCode::ACCEPTED,
                Json(RegistrationPending {
                    message: "Check your email to confirm your account.".to_string(),
                }),
            )
                .into_response();
            cookies.apply_to_response(response.headers_mut());
            Ok(response)
        }
    }
}

/// GET /auth/callback - Email-confirmation landing
///
/// Exchanges the provider's auth code for a session using the stored PKCE
/// verifier. This path is never redirected by the session gate.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirects to `next` or /onboarding, or back to /login on failure")
    )
)]
pub async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let cookie_name = state.session_cookie_name();
    let verifier = cookies::find(
        &cookies::parse_cookie_header(&headers),
        &pkce::verifier_cookie_name(&cookie_name),
    )
    .map(str::to_string);

    let exchanged = match (query.code.as_deref(), verifier) {
        (Some(code), Some(verifier)) => state
            .auth
            .exchange_code_for_session(code, &verifier)
            .await
            .map_err(|e| e.to_string()),
        (None, _) => Err(query
            .error_description
            .clone()
            .unwrap_or_else(|| "missing auth code".to_string())),
        (Some(_), None) => Err("missing code verifier".to_string()),
    };

    let mut server_session = state.response_session(&headers);
    let target = match exchanged {
        Ok(session) => {
            server_session.set_session(&session);
            ensure_profile_for(&state, &session).await;
            local_target(&state, query.next.as_deref(), ONBOARDING_PATH).to_string()
        }
        Err(reason) => {
            warn!("Auth callback failed: {}", reason);
            format!("{LOGIN_PATH}?error={CALLBACK_FAILED}")
        }
    };

    let mut cookies = server_session.into_store();
    cookies.push(pkce::verifier_removal(&cookie_name, state.config.cookie_secure));
    see_other_with_cookies(&state, &target, &cookies)
}

/// POST /logout - Sign out
#[utoipa::path(
    post,
    path = "/logout",
    request_body(content = LogoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed out; redirects to /login"),
        (status = 403, description = "CSRF token mismatch")
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    csrf: CsrfToken,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;

    let mut server_session = state.response_session(&headers);
    if let Some(session) = server_session.stored_session() {
        if let Err(e) = state.auth.sign_out(&session.access_token).await {
            warn!("Provider sign-out failed, clearing cookies anyway: {}", e);
        }
    }
    server_session.clear();
    let cookies = server_session.into_store();
    info!("User signed out");
    Ok(see_other_with_cookies(&state, LOGIN_PATH, &cookies))
}
