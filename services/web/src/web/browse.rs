//! services/web/src/web/browse.rs
//!
//! Browsing candidates and viewing one's own profile. Both routes sit behind
//! the session gate, so the viewer is always signed in and registered here.

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use matchmaking_core::age::{age_on, birth_date_bounds, MAX_AGE, MIN_AGE};
use matchmaking_core::{CandidateFilter, CandidatePage, Pagination, PortError, Profile};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::forms::{PaginationQuery, PaginationView};
use crate::web::extract::CurrentUser;
use crate::web::state::AppState;

//=========================================================================================
// Views
//=========================================================================================

/// The full profile, as its owner sees it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileView {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub interested_in: Vec<String>,
    pub age_min: Option<i16>,
    pub age_max: Option<i16>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
    pub onboarding_step: i16,
    pub registered_at: Option<DateTime<Utc>>,
}

impl From<&Profile> for ProfileView {
    fn from(p: &Profile) -> Self {
        let today = Utc::now().date_naive();
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            birth_date: p.birth_date,
            age: p.birth_date.map(|b| age_on(b, today)),
            gender: p.gender.map(|g| g.to_string()),
            interested_in: p.interested_in.iter().map(|g| g.to_string()).collect(),
            age_min: p.age_min,
            age_max: p.age_max,
            bio: p.bio.clone(),
            city: p.city.clone(),
            interests: p.interests.clone(),
            onboarding_step: p.onboarding_step,
            registered_at: p.registered_at,
        }
    }
}

/// What other viewers see of a profile. The birth date stays private.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileCard {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
}

impl ProfileCard {
    fn new(p: Profile, today: NaiveDate) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name,
            age: p.birth_date.map(|b| age_on(b, today)),
            gender: p.gender.map(|g| g.to_string()),
            city: p.city,
            bio: p.bio,
            interests: p.interests,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BrowsePage {
    pub candidates: Vec<ProfileCard>,
    pub pagination: PaginationView,
}

//=========================================================================================
// Candidate selection
//=========================================================================================

/// Candidates matching the viewer's stated preferences, as of `today`.
pub fn candidate_filter(viewer: Option<&Profile>, today: NaiveDate) -> CandidateFilter {
    let Some(profile) = viewer else {
        return CandidateFilter::default();
    };
    let (born_on_or_before, born_after) = birth_date_bounds(
        profile.age_min.unwrap_or(MIN_AGE),
        profile.age_max.unwrap_or(MAX_AGE),
        today,
    );
    CandidateFilter {
        genders: (!profile.interested_in.is_empty()).then(|| profile.interested_in.clone()),
        born_on_or_before,
        born_after,
    }
}

async fn fetch_page(
    state: &AppState,
    viewer: Uuid,
    filter: &CandidateFilter,
    pagination: &Pagination,
) -> Result<CandidatePage, ApiError> {
    Ok(state
        .profiles
        .list_candidates(viewer, filter, pagination.limit(), pagination.offset())
        .await?)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /browse - Candidates filtered by the viewer's preferences
#[utoipa::path(
    get,
    path = "/browse",
    params(PaginationQuery),
    responses(
        (status = 200, description = "One page of candidates", body = BrowsePage),
        (status = 307, description = "Not signed in, or onboarding incomplete"),
        (status = 422, description = "Invalid page number")
    )
)]
pub async fn browse(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<BrowsePage>, ApiError> {
    query.validate()?;
    let today = Utc::now().date_naive();
    let filter = candidate_filter(viewer.profile.as_ref(), today);
    let per_page = state.config.browse_page_size;

    // The total is unknown until the first query; assume the requested page exists.
    let requested = Pagination::new(query.page(), per_page, u64::MAX);
    let mut page = fetch_page(&state, viewer.user.id, &filter, &requested).await?;
    let mut pagination = Pagination::new(query.page(), per_page, page.total);
    if pagination.page != requested.page {
        debug!(
            requested = requested.page,
            last = pagination.page,
            "Requested page past the end, showing the last page"
        );
        page = fetch_page(&state, viewer.user.id, &filter, &pagination).await?;
        pagination = Pagination::new(pagination.page, per_page, page.total);
    }

    Ok(Json(BrowsePage {
        candidates: page
            .profiles
            .into_iter()
            .map(|p| ProfileCard::new(p, today))
            .collect(),
        pagination: PaginationView::from(&pagination),
    }))
}

/// GET /profile - The viewer's own profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The signed-in user's profile", body = ProfileView),
        (status = 307, description = "Not signed in, or onboarding incomplete"),
        (status = 404, description = "No profile row")
    )
)]
pub async fn my_profile(
    State(state): State<Arc<AppState>>,
    viewer: CurrentUser,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = match viewer.profile {
        Some(profile) => profile,
        None => state
            .profiles
            .get_profile(viewer.user.id)
            .await?
            .ok_or_else(|| PortError::NotFound("Profile not found".to_string()))?,
    };
    Ok(Json(ProfileView::from(&profile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchmaking_core::Gender;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn filter_follows_viewer_preferences() {
        let mut profile = Profile::empty(Uuid::nil(), Utc::now());
        profile.interested_in = vec![Gender::Woman];
        profile.age_min = Some(25);
        profile.age_max = Some(30);

        let filter = candidate_filter(Some(&profile), date(2024, 6, 15));
        assert_eq!(filter.genders, Some(vec![Gender::Woman]));
        assert_eq!(filter.born_on_or_before, Some(date(1999, 6, 15)));
        assert_eq!(filter.born_after, Some(date(1993, 6, 15)));
    }

    #[test]
    fn missing_preferences_fall_back_to_adult_range() {
        let profile = Profile::empty(Uuid::nil(), Utc::now());
        let filter = candidate_filter(Some(&profile), date(2024, 6, 15));
        assert_eq!(filter.genders, None);
        assert_eq!(filter.born_on_or_before, Some(date(2006, 6, 15)));
        assert_eq!(filter.born_after, Some(date(1903, 6, 15)));
        assert_eq!(candidate_filter(None, date(2024, 6, 15)), CandidateFilter::default());
    }

    #[test]
    fn cards_hide_birth_dates() {
        let mut profile = Profile::empty(Uuid::nil(), Utc::now());
        profile.birth_date = Some(date(2000, 1, 1));
        let card = ProfileCard::new(profile, date(2024, 6, 15));
        assert_eq!(card.age, Some(24));
        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("birth_date").is_none());
    }
}
