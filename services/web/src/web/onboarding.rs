//! services/web/src/web/onboarding.rs
//!
//! The multi-step profile-completion flow. Steps must be saved in order; the
//! last one stamps the profile as registered and opens the rest of the app.

use axum::{
    extract::State,
    response::{Json, Response},
    Form,
};
use matchmaking_core::access::{BROWSE_PATH, ONBOARDING_PATH};
use matchmaking_core::onboarding::{ready_to_complete, TOTAL_STEPS};
use matchmaking_core::{Gender, OnboardingStep, Profile};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::forms::{AboutForm, BasicsForm, PreferencesForm, INTEREST_OPTIONS};
use crate::web::browse::ProfileView;
use crate::web::extract::CurrentUser;
use crate::web::see_other;
use crate::web::state::{AppState, CsrfToken};

#[derive(Debug, Serialize, ToSchema)]
pub struct OnboardingPage {
    pub csrf_token: String,
    /// `basics`, `preferences`, `about` or `complete`.
    pub step: String,
    pub step_number: i16,
    pub total_steps: i16,
    /// Values saved so far, to prefill the forms.
    pub profile: ProfileView,
    pub gender_options: Vec<String>,
    pub interest_options: Vec<String>,
}

/// The viewer's profile, creating the empty row if sign-up did not.
async fn current_profile(state: &AppState, viewer: &CurrentUser) -> Result<Profile, ApiError> {
    match &viewer.profile {
        Some(profile) => Ok(profile.clone()),
        None => Ok(state.profiles.ensure_profile(viewer.user.id).await?),
    }
}

fn ensure_in_order(step: OnboardingStep, profile: &Profile) -> Result<(), ApiError> {
    if step.can_submit(profile.onboarding_step) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Complete the {} step first.",
            OnboardingStep::current_for(profile.onboarding_step)
        )))
    }
}

fn converted<T>(value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Internal("validated form failed to convert".to_string()))
}

/// GET /onboarding - Current step and saved values
#[utoipa::path(
    get,
    path = "/onboarding",
    responses(
        (status = 200, description = "Onboarding state", body = OnboardingPage),
        (status = 307, description = "Not signed in, or already registered")
    )
)]
pub async fn onboarding_page(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    csrf: CsrfToken,
) -> Result<Json<OnboardingPage>, ApiError> {
    let profile = current_profile(&state, &viewer).await?;
    let step = OnboardingStep::current_for(profile.onboarding_step);
    Ok(Json(OnboardingPage {
        csrf_token: csrf.0,
        step: step.to_string(),
        step_number: step.number().min(TOTAL_STEPS),
        total_steps: TOTAL_STEPS,
        profile: ProfileView::from(&profile),
        gender_options: Gender::ALL.iter().map(|g| g.to_string()).collect(),
        interest_options: INTEREST_OPTIONS.iter().map(|s| s.to_string()).collect(),
    }))
}

/// POST /onboarding/basics - Save name, birth date and gender
#[utoipa::path(
    post,
    path = "/onboarding/basics",
    request_body(content = BasicsForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirects to /onboarding"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn save_basics(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    csrf: CsrfToken,
    Form(form): Form<BasicsForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    form.validate()?;
    let profile = current_profile(&state, &viewer).await?;
    ensure_in_order(OnboardingStep::Basics, &profile)?;

    let basics = converted(form.into_domain())?;
    state.profiles.save_basics(viewer.user.id, &basics).await?;
    info!(user_id = %viewer.user.id, "Saved onboarding basics");
    Ok(see_other(&state, ONBOARDING_PATH))
}

/// POST /onboarding/preferences - Save who the user wants to meet
#[utoipa::path(
    post,
    path = "/onboarding/preferences",
    request_body(content = PreferencesForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirects to /onboarding"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 409, description = "An earlier step is missing"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn save_preferences(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    csrf: CsrfToken,
    Form(form): Form<PreferencesForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    form.validate()?;
    let profile = current_profile(&state, &viewer).await?;
    ensure_in_order(OnboardingStep::Preferences, &profile)?;

    let preferences = converted(form.into_domain())?;
    state
        .profiles
        .save_preferences(viewer.user.id, &preferences)
        .await?;
    info!(user_id = %viewer.user.id, "Saved onboarding preferences");
    Ok(see_other(&state, ONBOARDING_PATH))
}

/// POST /onboarding/about - Save the bio and finish onboarding
#[utoipa::path(
    post,
    path = "/onboarding/about",
    request_body(content = AboutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Onboarding complete; redirects to /browse"),
        (status = 403, description = "CSRF token mismatch"),
        (status = 409, description = "An earlier step is missing"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn save_about(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    csrf: CsrfToken,
    Form(form): Form<AboutForm>,
) -> Result<Response, ApiError> {
    csrf.verify(&form.csrf_token)?;
    form.validate()?;
    let profile = current_profile(&state, &viewer).await?;
    ensure_in_order(OnboardingStep::About, &profile)?;

    let about = converted(form.into_domain())?;
    let saved = state.profiles.save_about(viewer.user.id, &about).await?;
    if !ready_to_complete(saved.onboarding_step) {
        return Err(ApiError::Conflict(format!(
            "Complete the {} step first.",
            OnboardingStep::current_for(saved.onboarding_step)
        )));
    }
    state.profiles.complete_onboarding(viewer.user.id).await?;
    info!(user_id = %viewer.user.id, "Onboarding complete");
    Ok(see_other(&state, BROWSE_PATH))
}
