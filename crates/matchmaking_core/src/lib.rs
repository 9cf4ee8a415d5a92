pub mod access;
pub mod age;
pub mod domain;
pub mod onboarding;
pub mod pagination;
pub mod ports;

pub use domain::{
    About, AuthSession, AuthUser, Basics, CandidateFilter, CandidatePage, Gender, Preferences,
    Profile, RateLimitDecision, RateLimitPolicy, SignUpOutcome, SignUpRequest,
};
pub use onboarding::OnboardingStep;
pub use pagination::{PageItem, Pagination};
pub use ports::{
    AdminAuthService, AuthService, PortError, PortResult, ProfileRepository, RateLimiter,
};
