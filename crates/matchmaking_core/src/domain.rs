//! crates/matchmaking_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Users and sessions are owned by the hosted auth provider; profiles live in
//! the application's own row store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Auth Provider Entities
//=========================================================================================

/// A user as reported by the auth provider. Opaque beyond its id and email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// A provider-issued session. This is exactly what the session cookie stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    /// Whether the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at - now.timestamp() <= margin_secs
    }
}

/// Result of a sign-up. Projects that require email confirmation return no session.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
}

/// Parameters forwarded to the provider on sign-up.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Where the confirmation email should send the user back to.
    pub email_redirect_to: String,
    /// PKCE challenge (S256) derived from the verifier kept in a cookie.
    pub code_challenge: String,
}

//=========================================================================================
// Profile
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Woman,
    Man,
    NonBinary,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Woman, Gender::Man, Gender::NonBinary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Woman => "woman",
            Self::Man => "man",
            Self::NonBinary => "non_binary",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gender '{0}'")]
pub struct UnknownGender(pub String);

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| UnknownGender(s.to_string()))
    }
}

/// The application-side record for a user. Keyed by the auth provider's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub interested_in: Vec<Gender>,
    pub age_min: Option<i16>,
    pub age_max: Option<i16>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
    /// Number of onboarding steps saved so far.
    pub onboarding_step: i16,
    /// Null until onboarding completes.
    pub registered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh, empty profile row for a newly signed-up user.
    pub fn empty(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: None,
            birth_date: None,
            gender: None,
            interested_in: Vec::new(),
            age_min: None,
            age_max: None,
            bio: None,
            city: None,
            interests: Vec::new(),
            onboarding_step: 0,
            registered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered_at.is_some()
    }
}

//=========================================================================================
// Onboarding Step Payloads
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basics {
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub interested_in: Vec<Gender>,
    pub age_min: i16,
    pub age_max: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct About {
    pub bio: String,
    pub city: String,
    pub interests: Vec<String>,
}

//=========================================================================================
// Browsing
//=========================================================================================

/// Narrows the candidates a viewer sees while browsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Only candidates with one of these genders; `None` means any.
    pub genders: Option<Vec<Gender>>,
    /// Inclusive upper bound on birth date (enforces the minimum age).
    pub born_on_or_before: Option<NaiveDate>,
    /// Exclusive lower bound on birth date (enforces the maximum age).
    pub born_after: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CandidatePage {
    pub profiles: Vec<Profile>,
    pub total: u64,
}

//=========================================================================================
// Rate Limiting
//=========================================================================================

/// How many requests a key may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (seconds) at which the current window resets.
    pub reset_at: i64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now.timestamp()).max(1)
    }
}
