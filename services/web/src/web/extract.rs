//! services/web/src/web/extract.rs
//!
//! Extractors that read what the edge middleware left in request extensions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use matchmaking_core::{AuthSession, AuthUser, Profile};

use crate::error::ApiError;
use crate::web::state::{AuthContext, CsrfToken};

/// The signed-in viewer. Rejects with 401 when the gate found no user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub session: AuthSession,
    /// Present when the route needed it and the lookup succeeded.
    pub profile: Option<Profile>,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default();
        match (context.user, context.session) {
            (Some(user), Some(session)) => Ok(Self {
                user,
                session,
                profile: context.profile,
            }),
            _ => Err(ApiError::Unauthorized("Authentication required.".to_string())),
        }
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or(ApiError::Csrf)
    }
}
