//! services/web/src/forms/onboarding.rs
//!
//! Onboarding step forms. Each form validates its trimmed fields and converts into
//! the core payload the profile repository stores.

use chrono::{NaiveDate, Utc};
use matchmaking_core::age::{age_on, MAX_AGE, MIN_AGE};
use matchmaking_core::{About, Basics, Gender, Preferences};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{deserialize_trimmed, invalid, split_list};

/// Interests a profile can pick from.
pub const INTEREST_OPTIONS: &[&str] = &[
    "art",
    "board_games",
    "cooking",
    "cycling",
    "dancing",
    "film",
    "fitness",
    "gaming",
    "gardening",
    "hiking",
    "music",
    "photography",
    "reading",
    "running",
    "tech",
    "travel",
    "volunteering",
    "writing",
    "yoga",
];

const MAX_INTERESTS: usize = 5;

static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}[\p{L} '\-]*$").unwrap());

//=========================================================================================
// Basics
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BasicsForm {
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(
        length(min = 2, max = 40, message = "must be between 2 and 40 characters long"),
        custom(function = "validate_display_name")
    )]
    pub display_name: String,
    /// `YYYY-MM-DD`, as submitted by a date input.
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: String,
    #[validate(custom(function = "validate_gender"))]
    pub gender: String,
    #[serde(default)]
    pub csrf_token: String,
}

fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if DISPLAY_NAME_RE.is_match(name.trim()) {
        Ok(())
    } else {
        Err(invalid(
            "display_name",
            "may only contain letters, spaces, apostrophes and hyphens",
        ))
    }
}

fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Birth date check against an explicit `today`.
pub fn check_birth_date(raw: &str, today: NaiveDate) -> Result<(), ValidationError> {
    let birth = parse_birth_date(raw).ok_or_else(|| invalid("date", "must be a date (YYYY-MM-DD)"))?;
    let age = age_on(birth, today);
    if age < i32::from(MIN_AGE) {
        Err(invalid("too_young", "you must be at least 18 years old"))
    } else if age > i32::from(MAX_AGE) {
        Err(invalid("too_old", "please enter a valid birth date"))
    } else {
        Ok(())
    }
}

fn validate_birth_date(raw: &str) -> Result<(), ValidationError> {
    check_birth_date(raw, Utc::now().date_naive())
}

fn validate_gender(raw: &str) -> Result<(), ValidationError> {
    raw.trim()
        .parse::<Gender>()
        .map(|_| ())
        .map_err(|_| invalid("gender", "must be one of woman, man, non_binary"))
}

impl BasicsForm {
    /// Converts a validated form into the stored payload.
    pub fn into_domain(self) -> Option<Basics> {
        Some(Basics {
            display_name: self.display_name.trim().to_string(),
            birth_date: parse_birth_date(&self.birth_date)?,
            gender: self.gender.trim().parse().ok()?,
        })
    }
}

//=========================================================================================
// Preferences
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_age_range"))]
pub struct PreferencesForm {
    /// Comma-separated genders, e.g. `woman,non_binary`.
    #[validate(custom(function = "validate_gender_list"))]
    pub interested_in: String,
    #[validate(range(min = 18, max = 120, message = "must be between 18 and 120"))]
    pub age_min: i16,
    #[validate(range(min = 18, max = 120, message = "must be between 18 and 120"))]
    pub age_max: i16,
    #[serde(default)]
    pub csrf_token: String,
}

/// Parses a comma list of genders, dropping duplicates and keeping order.
pub fn parse_gender_list(raw: &str) -> Result<Vec<Gender>, ValidationError> {
    let mut genders = Vec::new();
    for item in split_list(raw) {
        let gender = item
            .parse::<Gender>()
            .map_err(|_| invalid("gender", "must only contain woman, man, non_binary"))?;
        if !genders.contains(&gender) {
            genders.push(gender);
        }
    }
    if genders.is_empty() {
        return Err(invalid("required", "choose at least one"));
    }
    Ok(genders)
}

fn validate_gender_list(raw: &str) -> Result<(), ValidationError> {
    parse_gender_list(raw).map(|_| ())
}

fn validate_age_range(form: &PreferencesForm) -> Result<(), ValidationError> {
    if form.age_min <= form.age_max {
        Ok(())
    } else {
        Err(invalid(
            "age_range",
            "minimum age must not be greater than maximum age",
        ))
    }
}

impl PreferencesForm {
    pub fn into_domain(self) -> Option<Preferences> {
        Some(Preferences {
            interested_in: parse_gender_list(&self.interested_in).ok()?,
            age_min: self.age_min,
            age_max: self.age_max,
        })
    }
}

//=========================================================================================
// About
//=========================================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AboutForm {
    #[serde(default, deserialize_with = "deserialize_trimmed")]
    #[validate(length(max = 500, message = "must be at most 500 characters long"))]
    pub bio: String,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[validate(length(min = 1, max = 80, message = "must be between 1 and 80 characters long"))]
    pub city: String,
    /// Comma-separated picks from the interest catalogue.
    #[serde(default)]
    #[validate(custom(function = "validate_interests"))]
    pub interests: String,
    #[serde(default)]
    pub csrf_token: String,
}

pub fn parse_interests(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut interests = Vec::new();
    for item in split_list(raw) {
        if !INTEREST_OPTIONS.contains(&item) {
            return Err(invalid("unknown_interest", "contains an unknown interest"));
        }
        if !seen.insert(item) {
            return Err(invalid("duplicate_interest", "must not repeat an interest"));
        }
        interests.push(item.to_string());
    }
    match interests.len() {
        0 => Err(invalid("required", "choose at least one interest")),
        n if n > MAX_INTERESTS => Err(invalid("too_many", "choose at most 5 interests")),
        _ => Ok(interests),
    }
}

fn validate_interests(raw: &str) -> Result<(), ValidationError> {
    parse_interests(raw).map(|_| ())
}

impl AboutForm {
    pub fn into_domain(self) -> Option<About> {
        Some(About {
            bio: self.bio.trim().to_string(),
            city: self.city.trim().to_string(),
            interests: parse_interests(&self.interests).ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn display_name_allows_letters_spaces_apostrophes_and_hyphens() {
        for ok in ["Jo", "Mary-Jane", "D'Arcy O'Neil", "Zoë"] {
            assert!(validate_display_name(ok).is_ok(), "{ok}");
        }
        for bad in ["R2D2", "-lead", "name!", "  "] {
            assert!(validate_display_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn birth_date_must_be_adult_and_plausible() {
        let today = date(2024, 6, 15);
        assert!(check_birth_date("2006-06-15", today).is_ok());
        assert_eq!(check_birth_date("2006-06-16", today).unwrap_err().code, "too_young");
        assert_eq!(check_birth_date("1900-01-01", today).unwrap_err().code, "too_old");
        assert_eq!(check_birth_date("15/06/2000", today).unwrap_err().code, "date");
    }

    #[test]
    fn gender_list_dedups_and_requires_one() {
        assert_eq!(
            parse_gender_list("woman, man,woman").unwrap(),
            vec![Gender::Woman, Gender::Man]
        );
        assert_eq!(parse_gender_list(" , ").unwrap_err().code, "required");
        assert_eq!(parse_gender_list("woman,robot").unwrap_err().code, "gender");
    }

    #[test]
    fn preferences_reject_inverted_range() {
        let form = PreferencesForm {
            interested_in: "woman".to_string(),
            age_min: 40,
            age_max: 30,
            csrf_token: String::new(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));

        let form = PreferencesForm {
            interested_in: "woman".to_string(),
            age_min: 17,
            age_max: 30,
            csrf_token: String::new(),
        };
        assert!(form.validate().unwrap_err().field_errors().contains_key("age_min"));
    }

    #[test]
    fn interests_come_from_the_catalogue() {
        assert_eq!(
            parse_interests("hiking,music").unwrap(),
            vec!["hiking".to_string(), "music".to_string()]
        );
        assert_eq!(parse_interests("").unwrap_err().code, "required");
        assert_eq!(parse_interests("hiking,skydiving").unwrap_err().code, "unknown_interest");
        assert_eq!(parse_interests("hiking,hiking").unwrap_err().code, "duplicate_interest");
        assert_eq!(
            parse_interests("art,film,yoga,tech,music,travel").unwrap_err().code,
            "too_many"
        );
    }

    #[test]
    fn about_form_converts_trimmed_values() {
        let form = AboutForm {
            bio: "  Hi there ".to_string(),
            city: " Lisbon ".to_string(),
            interests: "reading, travel".to_string(),
            csrf_token: String::new(),
        };
        assert!(form.validate().is_ok());
        let about = form.into_domain().unwrap();
        assert_eq!(about.bio, "Hi there");
        assert_eq!(about.city, "Lisbon");
        assert_eq!(about.interests, vec!["reading", "travel"]);
    }

    #[test]
    fn text_fields_are_validated_after_trimming() {
        let form: AboutForm = serde_json::from_value(serde_json::json!({
            "bio": "  ",
            "city": " ",
            "interests": "hiking",
        }))
        .unwrap();
        assert_eq!(form.bio, "");
        assert!(form.validate().unwrap_err().field_errors().contains_key("city"));

        let form: BasicsForm = serde_json::from_value(serde_json::json!({
            "display_name": " J ",
            "birth_date": "1990-02-03",
            "gender": "woman",
        }))
        .unwrap();
        assert_eq!(form.display_name, "J");
        assert!(form.validate().unwrap_err().field_errors().contains_key("display_name"));
    }

    #[test]
    fn basics_form_converts_to_domain() {
        let form = BasicsForm {
            display_name: "Sam Rivera".to_string(),
            birth_date: "1990-02-03".to_string(),
            gender: "non_binary".to_string(),
            csrf_token: String::new(),
        };
        let basics = form.into_domain().unwrap();
        assert_eq!(basics.birth_date, date(1990, 2, 3));
        assert_eq!(basics.gender, Gender::NonBinary);
    }
}
