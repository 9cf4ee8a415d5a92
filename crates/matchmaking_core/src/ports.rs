//! crates/matchmaking_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the hosted auth provider, the row store and the rate limiter.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    About, AuthSession, AuthUser, Basics, CandidateFilter, CandidatePage, Preferences, Profile,
    RateLimitDecision, RateLimitPolicy, SignUpOutcome, SignUpRequest,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The remote service understood the request and refused it.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The hosted authentication service, as seen with the public (anon) key.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_up(&self, request: SignUpRequest) -> PortResult<SignUpOutcome>;

    /// Verifies an access token with the provider and returns its user.
    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser>;

    async fn refresh_session(&self, refresh_token: &str) -> PortResult<AuthSession>;

    /// Exchanges a PKCE auth code (from the email-confirmation link) for a session.
    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> PortResult<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> PortResult<()>;
}

/// Privileged provider operations that need the service-role key.
#[async_trait]
pub trait AdminAuthService: Send + Sync {
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Returns `None` when the user has no profile row yet.
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    /// Creates an empty profile row if one does not exist, returning the current row.
    async fn ensure_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn save_basics(&self, user_id: Uuid, basics: &Basics) -> PortResult<Profile>;

    async fn save_preferences(&self, user_id: Uuid, preferences: &Preferences)
        -> PortResult<Profile>;

    async fn save_about(&self, user_id: Uuid, about: &About) -> PortResult<Profile>;

    /// Stamps `registered_at`. Leaves an already-registered profile untouched.
    async fn complete_onboarding(&self, user_id: Uuid) -> PortResult<Profile>;

    /// Registered profiles other than `viewer`, filtered and paged.
    async fn list_candidates(
        &self,
        viewer: Uuid,
        filter: &CandidateFilter,
        limit: u32,
        offset: u64,
    ) -> PortResult<CandidatePage>;

    async fn delete_profile(&self, user_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request against `key` and reports whether it may proceed.
    async fn check(&self, key: &str, policy: &RateLimitPolicy) -> PortResult<RateLimitDecision>;
}
