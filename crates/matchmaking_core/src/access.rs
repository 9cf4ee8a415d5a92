//! crates/matchmaking_core/src/access.rs
//!
//! Route classification and the redirect policy applied to every page request.
//! The edge middleware resolves who the viewer is; this module decides where
//! that viewer is allowed to be.

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const BROWSE_PATH: &str = "/browse";
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Query parameter carrying the originally requested path through login.
pub const REDIRECT_TO_PARAM: &str = "redirectTo";

const PROTECTED_PREFIXES: &[&str] = &[BROWSE_PATH, "/matches", "/messages", "/profile", "/settings"];
const AUTH_PREFIXES: &[&str] = &[LOGIN_PATH, REGISTER_PATH];
const ONBOARDING_PREFIXES: &[&str] = &[ONBOARDING_PATH];

const EXEMPT_PREFIXES: &[&str] = &["/static/"];
const EXEMPT_FILES: &[&str] = &["/favicon.ico", "/robots.txt", "/health"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Provider redirect target; never redirected away from.
    AuthCallback,
    /// Requires a session and a completed profile.
    Protected,
    /// Login and registration pages.
    Auth,
    /// The profile-completion flow.
    Onboarding,
    Public,
}

impl RouteKind {
    /// Whether deciding access for this route requires the viewer's profile.
    pub fn needs_profile(&self) -> bool {
        matches!(self, Self::Protected | Self::Auth | Self::Onboarding)
    }
}

/// Who is making the request, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Authenticated { registered: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Continue,
    /// Send the viewer to login, remembering where they were going.
    Login { redirect_to: String },
    Redirect(&'static str),
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(path, prefix))
}

pub fn classify(path: &str) -> RouteKind {
    if matches_prefix(path, AUTH_CALLBACK_PATH) {
        RouteKind::AuthCallback
    } else if matches_any(path, PROTECTED_PREFIXES) {
        RouteKind::Protected
    } else if matches_any(path, AUTH_PREFIXES) {
        RouteKind::Auth
    } else if matches_any(path, ONBOARDING_PREFIXES) {
        RouteKind::Onboarding
    } else {
        RouteKind::Public
    }
}

/// Static assets and probes skip the interception layer entirely.
pub fn is_exempt_asset(path: &str) -> bool {
    EXEMPT_FILES.contains(&path)
        || EXEMPT_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

pub fn decide(path: &str, route: RouteKind, viewer: Viewer) -> AccessDecision {
    use AccessDecision::*;

    match (route, viewer) {
        (RouteKind::AuthCallback | RouteKind::Public, _) => Continue,
        (RouteKind::Protected | RouteKind::Onboarding, Viewer::Anonymous) => Login {
            redirect_to: path.to_string(),
        },
        (RouteKind::Auth, Viewer::Anonymous) => Continue,
        (RouteKind::Auth | RouteKind::Onboarding, Viewer::Authenticated { registered: true }) => {
            Redirect(BROWSE_PATH)
        }
        (RouteKind::Auth | RouteKind::Protected, Viewer::Authenticated { registered: false }) => {
            Redirect(ONBOARDING_PATH)
        }
        (RouteKind::Protected, Viewer::Authenticated { registered: true })
        | (RouteKind::Onboarding, Viewer::Authenticated { registered: false }) => Continue,
    }
}

/// Accepts only same-site absolute paths; anything else yields `fallback`.
///
/// `Url::join` drops tabs and newlines, turning `/\t/host` into `//host`, so
/// control characters and whitespace are refused outright.
pub fn safe_redirect_target<'a>(candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(|c| c.is_control() || c.is_whitespace()) =>
        {
            path
        }
        _ => fallback,
    }
}
