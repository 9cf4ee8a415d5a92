//! services/web/src/forms/auth.rs
//!
//! Sign-in, registration and sign-out form payloads.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{deserialize_checkbox, invalid};

//=========================================================================================
// Login
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginForm {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
    /// Where to send the user after signing in. Only same-site paths are honoured.
    #[serde(default, rename = "redirectTo", alias = "redirect_to")]
    pub redirect_to: Option<String>,
}

//=========================================================================================
// Registration
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegistrationForm {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 8, max = 72, message = "must be between 8 and 72 characters long"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm_password: String,
    #[serde(default, deserialize_with = "deserialize_checkbox")]
    #[validate(custom(function = "validate_terms_accepted"))]
    pub accept_terms: bool,
    #[serde(default)]
    pub csrf_token: String,
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        Err(invalid(
            "password_strength",
            "must contain at least one letter and one number",
        ))
    }
}

fn validate_terms_accepted(accepted: &bool) -> Result<(), ValidationError> {
    if *accepted {
        Ok(())
    } else {
        Err(invalid("terms", "you must accept the terms to register"))
    }
}

//=========================================================================================
// Logout
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}
