//! services/web/src/forms/mod.rs
//!
//! Submitted form payloads and their validation rules.

pub mod auth;
pub mod onboarding;
pub mod pagination;

use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use validator::ValidationError;

pub use auth::{LoginForm, LogoutForm, RegistrationForm};
pub use onboarding::{AboutForm, BasicsForm, PreferencesForm, INTEREST_OPTIONS};
pub use pagination::{PageItemView, PaginationQuery, PaginationView};

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Splits a comma-separated form value, dropping blanks.
pub(crate) fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Text fields are stored trimmed, so they are validated trimmed.
pub(crate) fn deserialize_trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// HTML checkboxes submit `on` when ticked and nothing at all otherwise.
pub(crate) fn deserialize_checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(
        raw.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("on" | "true" | "1" | "yes")
    ))
}
