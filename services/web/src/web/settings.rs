//! services/web/src/web/settings.rs
//!
//! Account settings. Deleting an account removes the provider user and the
//! profile row, then signs the browser out.

use axum::{extract::State, http::HeaderMap, response::Response, Form};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::forms::LogoutForm;
use crate::web::extract::CurrentUser;
use crate::web::see_other_with_cookies;
use crate::web::state::{AppState, CsrfToken};

/// POST /settings/delete-account - Permanently delete the account
///
/// Removes the user from the auth provider first; only then is the profile row
/// dropped and the session cleared.
#[utoipa::path(
    post,
    path = "/settings/delete-account",
    request_body(content = LogoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Account deleted; redirects to /"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 502, description = "Auth provider unavailable")
    )
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    csrf: CsrfToken,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    let user_id = viewer.user.id;

    state.admin.delete_user(user_id).await?;
    if let Err(e) = state.profiles.delete_profile(user_id).await {
        warn!(%user_id, "Auth user deleted but profile row remains: {}", e);
    }
    info!(%user_id, "Account deleted");

    let mut server_session = state.response_session(&headers);
    server_session.clear();
    let cookies = server_session.into_store();
    Ok(see_other_with_cookies(&state, "/", &cookies))
}
