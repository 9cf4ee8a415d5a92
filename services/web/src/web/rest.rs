//! services/web/src/web/rest.rs
//!
//! The health probe and the master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::forms::{
    AboutForm, BasicsForm, LoginForm, LogoutForm, PageItemView, PaginationView, PreferencesForm,
    RegistrationForm,
};
use crate::web::auth::{AuthPage, RegistrationPending};
use crate::web::browse::{BrowsePage, ProfileCard, ProfileView};
use crate::web::onboarding::OnboardingPage;
use crate::web::{auth, browse, onboarding, settings};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::login_page,
        auth::login,
        auth::register_page,
        auth::register,
        auth::auth_callback,
        auth::logout,
        onboarding::onboarding_page,
        onboarding::save_basics,
        onboarding::save_preferences,
        onboarding::save_about,
        browse::browse,
        browse::my_profile,
        settings::delete_account,
    ),
    components(
        schemas(
            AuthPage,
            RegistrationPending,
            LoginForm,
            RegistrationForm,
            LogoutForm,
            OnboardingPage,
            BasicsForm,
            PreferencesForm,
            AboutForm,
            BrowsePage,
            ProfileCard,
            ProfileView,
            PaginationView,
            PageItemView,
        )
    ),
    tags(
        (name = "Matchmaking", description = "Page endpoints of the matchmaking web app.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Handlers
//=========================================================================================

/// Liveness probe. Skips the edge middleware entirely.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_page_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/login", "/auth/callback", "/onboarding/about", "/browse"] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health_handler().await, "ok");
    }
}
