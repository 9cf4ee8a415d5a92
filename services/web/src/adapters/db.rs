//! services/web/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileRepository` port from the `core` crate. It handles all interactions
//! with the PostgreSQL profile store using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use matchmaking_core::domain::{About, Basics, CandidateFilter, CandidatePage, Gender, Preferences, Profile};
use matchmaking_core::onboarding::{OnboardingStep, TOTAL_STEPS};
use matchmaking_core::ports::{PortError, PortResult, ProfileRepository};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProfileRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

const PROFILE_COLUMNS: &str = "id, display_name, birth_date, gender, interested_in, age_min, age_max, \
     bio, city, interests, onboarding_step, registered_at, created_at, updated_at";

/// Shared WHERE clause for candidate listing and counting.
const CANDIDATE_FILTER: &str = "registered_at IS NOT NULL AND id <> $1 \
     AND ($2::text[] IS NULL OR gender = ANY($2)) \
     AND ($3::date IS NULL OR birth_date <= $3) \
     AND ($4::date IS NULL OR birth_date > $4)";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    display_name: Option<String>,
    birth_date: Option<NaiveDate>,
    gender: Option<String>,
    interested_in: Vec<String>,
    age_min: Option<i16>,
    age_max: Option<i16>,
    bio: Option<String>,
    city: Option<String>,
    interests: Vec<String>,
    onboarding_step: i16,
    registered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_gender(raw: &str, profile_id: Uuid) -> Option<Gender> {
    raw.parse::<Gender>()
        .map_err(|e| warn!("Profile {} has {}", profile_id, e))
        .ok()
}

impl ProfileRecord {
    fn to_domain(self) -> Profile {
        let id = self.id;
        Profile {
            id,
            display_name: self.display_name,
            birth_date: self.birth_date,
            gender: self.gender.as_deref().and_then(|g| parse_gender(g, id)),
            interested_in: self
                .interested_in
                .iter()
                .filter_map(|g| parse_gender(g, id))
                .collect(),
            age_min: self.age_min,
            age_max: self.age_max,
            bio: self.bio,
            city: self.city,
            interests: self.interests,
            onboarding_step: self.onboarding_step,
            registered_at: self.registered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn gender_names(genders: &[Gender]) -> Vec<String> {
    genders.iter().map(|g| g.as_str().to_string()).collect()
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn ensure_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        sqlx::query("INSERT INTO profiles (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        self.get_profile(user_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn save_basics(&self, user_id: Uuid, basics: &Basics) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "INSERT INTO profiles (id, display_name, birth_date, gender, onboarding_step) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                display_name = EXCLUDED.display_name, \
                birth_date = EXCLUDED.birth_date, \
                gender = EXCLUDED.gender, \
                onboarding_step = GREATEST(profiles.onboarding_step, EXCLUDED.onboarding_step), \
                updated_at = now() \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&basics.display_name)
        .bind(basics.birth_date)
        .bind(basics.gender.as_str())
        .bind(OnboardingStep::Basics.number())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn save_preferences(
        &self,
        user_id: Uuid,
        preferences: &Preferences,
    ) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET \
                interested_in = $2, \
                age_min = $3, \
                age_max = $4, \
                onboarding_step = GREATEST(onboarding_step, $5), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(gender_names(&preferences.interested_in))
        .bind(preferences.age_min)
        .bind(preferences.age_max)
        .bind(OnboardingStep::Preferences.number())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn save_about(&self, user_id: Uuid, about: &About) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET \
                bio = $2, \
                city = $3, \
                interests = $4, \
                onboarding_step = GREATEST(onboarding_step, $5), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&about.bio)
        .bind(&about.city)
        .bind(&about.interests)
        .bind(OnboardingStep::About.number())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn complete_onboarding(&self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET \
                registered_at = COALESCE(registered_at, now()), \
                updated_at = now() \
             WHERE id = $1 AND onboarding_step >= $2 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(TOTAL_STEPS)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => Ok(record.to_domain()),
            None => match self.get_profile(user_id).await? {
                Some(_) => Err(PortError::Rejected(
                    "Finish every onboarding step first".to_string(),
                )),
                None => Err(PortError::NotFound(format!("Profile {} not found", user_id))),
            },
        }
    }

    async fn list_candidates(
        &self,
        viewer: Uuid,
        filter: &CandidateFilter,
        limit: u32,
        offset: u64,
    ) -> PortResult<CandidatePage> {
        let genders = filter.genders.as_deref().map(gender_names);
        let offset = i64::try_from(offset)
            .map_err(|_| PortError::Rejected("page offset out of range".to_string()))?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM profiles WHERE {CANDIDATE_FILTER}"
        ))
        .bind(viewer)
        .bind(&genders)
        .bind(filter.born_on_or_before)
        .bind(filter.born_after)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE {CANDIDATE_FILTER} \
             ORDER BY registered_at DESC, id \
             LIMIT $5 OFFSET $6"
        ))
        .bind(viewer)
        .bind(&genders)
        .bind(filter.born_on_or_before)
        .bind(filter.born_after)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(CandidatePage {
            profiles: records.into_iter().map(ProfileRecord::to_domain).collect(),
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn delete_profile(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
