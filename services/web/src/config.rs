//! services/web/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use matchmaking_core::RateLimitPolicy;
use reqwest::Url;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Base URL of the hosted auth/data provider, e.g. `https://abcd.supabase.co`.
    pub supabase_url: Url,
    pub supabase_anon_key: String,
    /// Only the admin client needs this; it refuses to start without it.
    pub supabase_service_role_key: Option<String>,
    /// Public origin of this site. Redirects and email links are built on it.
    pub site_url: Url,
    pub cors_allowed_origin: String,
    pub cookie_secure: bool,
    pub rate_limit: RateLimitPolicy,
    pub auth_rate_limit: RateLimitPolicy,
    pub browse_page_size: u32,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required_var("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Auth Provider Settings ---
        let supabase_url = parse_var("SUPABASE_URL", &required_var("SUPABASE_URL")?)?;
        let supabase_anon_key = required_var("SUPABASE_ANON_KEY")?;
        let supabase_service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        // --- Load Edge Settings ---
        let site_url_str = var_or("SITE_URL", "http://localhost:3000");
        let site_url: Url = parse_var("SITE_URL", &site_url_str)?;
        let cors_allowed_origin = std::env::var("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|_| site_url.origin().ascii_serialization());
        let cookie_secure = parse_var("COOKIE_SECURE", &var_or("COOKIE_SECURE", "true"))?;

        let window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", &var_or("RATE_LIMIT_WINDOW_SECS", "60"))?;
        let rate_limit = RateLimitPolicy {
            limit: parse_var("RATE_LIMIT_MAX", &var_or("RATE_LIMIT_MAX", "100"))?,
            window_secs,
        };
        let auth_rate_limit = RateLimitPolicy {
            limit: parse_var("AUTH_RATE_LIMIT_MAX", &var_or("AUTH_RATE_LIMIT_MAX", "10"))?,
            window_secs,
        };
        if window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_WINDOW_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let browse_page_size = parse_var("BROWSE_PAGE_SIZE", &var_or("BROWSE_PAGE_SIZE", "12"))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            site_url,
            cors_allowed_origin,
            cookie_secure,
            rate_limit,
            auth_rate_limit,
            browse_page_size,
        })
    }

    /// The provider project reference: the first DNS label of the provider host.
    pub fn project_ref(&self) -> String {
        self.supabase_url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or("local")
            .to_string()
    }

    /// Name of the cookie (or cookie-chunk prefix) holding the provider session.
    pub fn session_cookie_name(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Absolute URL on this site for `path_and_query`.
    pub fn site_link(&self, path: &str) -> Url {
        self.site_url
            .join(path)
            .unwrap_or_else(|_| self.site_url.clone())
    }

    /// Whether `path` resolves to a URL on this site's origin.
    pub fn is_on_site(&self, path: &str) -> bool {
        self.site_link(path).origin() == self.site_url.origin()
    }
}
