//! crates/matchmaking_core/src/onboarding.rs
//!
//! The onboarding step machine. A profile stores how many steps have been
//! saved; the steps themselves always progress linearly:
//! Basics → Preferences → About → Complete.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Basics,
    Preferences,
    About,
    Complete,
}

/// Number of steps a user fills in before onboarding can complete.
pub const TOTAL_STEPS: i16 = 3;

impl OnboardingStep {
    /// 1-based position of a fillable step; `Complete` sits past the end.
    pub fn number(&self) -> i16 {
        match self {
            Self::Basics => 1,
            Self::Preferences => 2,
            Self::About => 3,
            Self::Complete => TOTAL_STEPS + 1,
        }
    }

    /// The step a user with `saved` completed steps should see next.
    pub fn current_for(saved: i16) -> Self {
        match saved {
            i16::MIN..=0 => Self::Basics,
            1 => Self::Preferences,
            2 => Self::About,
            _ => Self::Complete,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Basics => Some(Self::Preferences),
            Self::Preferences => Some(Self::About),
            Self::About => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// A step may be (re)submitted once every earlier step has been saved.
    pub fn can_submit(&self, saved: i16) -> bool {
        !self.is_terminal() && saved >= self.number() - 1
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Basics => "basics",
            Self::Preferences => "preferences",
            Self::About => "about",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Onboarding may complete only when every fillable step has been saved.
pub fn ready_to_complete(saved: i16) -> bool {
    saved >= TOTAL_STEPS
}
