//! services/web/src/web/router.rs
//!
//! Assembles the page routes and wraps them in the edge middleware stack.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::web::csrf::CSRF_HEADER;
use crate::web::middleware::{
    self, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, X_REQUEST_ID,
};
use crate::web::rest::{health_handler, ApiDoc};
use crate::web::state::AppState;
use crate::web::{auth, browse, onboarding, settings};

/// Form posts are small; anything larger is refused before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(allowed_origin).map_err(|e| {
        ConfigError::InvalidValue("CORS_ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(CSRF_HEADER)])
        .expose_headers([
            X_REQUEST_ID,
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            RETRY_AFTER,
            HeaderName::from_static(CSRF_HEADER),
        ]))
}

/// Builds the full application router.
///
/// Middleware runs outermost first: request id, CORS, rate limiting,
/// anti-forgery token, session gate.
pub fn build_router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let cors = cors_layer(&state.config.cors_allowed_origin)?;

    let auth_routes = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/auth/callback", get(auth::auth_callback))
        .route("/logout", post(auth::logout));

    let onboarding_routes = Router::new()
        .route("/onboarding", get(onboarding::onboarding_page))
        .route("/onboarding/basics", post(onboarding::save_basics))
        .route("/onboarding/preferences", post(onboarding::save_preferences))
        .route("/onboarding/about", post(onboarding::save_about));

    let app_routes = Router::new()
        .route("/browse", get(browse::browse))
        .route("/profile", get(browse::my_profile))
        .route("/settings/delete-account", post(settings::delete_account));

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(auth_routes)
        .merge(onboarding_routes)
        .merge(app_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_gate,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::request_id))
        .with_state(state);

    Ok(router)
}
