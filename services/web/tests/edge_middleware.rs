//! Integration tests for the edge middleware and the page handlers.
//!
//! Each test builds the real router over in-process stub ports and drives it
//! with `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use matchmaking_core::{
    About, AdminAuthService, AuthService, AuthSession, AuthUser, Basics, CandidateFilter,
    CandidatePage, Gender, PortError, PortResult, Preferences, Profile, ProfileRepository,
    RateLimitDecision, RateLimitPolicy, RateLimiter, SignUpOutcome, SignUpRequest,
};
use web_lib::adapters::InMemoryRateLimiter;
use web_lib::config::Config;
use web_lib::session::cookies;
use web_lib::session::CookieOptions;
use web_lib::web::csrf;
use web_lib::web::{build_router, state::AppState};

const SITE: &str = "http://localhost:3000";
const SESSION_COOKIE: &str = "sb-testref-auth-token";
const VERIFIER_COOKIE: &str = "sb-testref-auth-token-code-verifier";
const GOOD_PASSWORD: &str = "correct-horse-1";

//=========================================================================================
// Stub ports
//=========================================================================================

fn session_for(user_id: Uuid, prefix: &str, expires_in: i64) -> AuthSession {
    AuthSession {
        access_token: format!("{prefix}:{user_id}"),
        refresh_token: format!("refresh:{user_id}"),
        token_type: "bearer".to_string(),
        expires_in,
        expires_at: Utc::now().timestamp() + expires_in,
        user: Some(AuthUser {
            id: user_id,
            email: Some("someone@example.com".to_string()),
        }),
    }
}

fn user_in(token: &str) -> PortResult<Uuid> {
    token
        .rsplit(':')
        .next()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or(PortError::Unauthorized)
}

/// Accepts any `<prefix>:<uuid>` token except revoked ones.
struct StubAuth {
    login_user: Uuid,
    signed_out: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthService for StubAuth {
    async fn sign_in_with_password(&self, _email: &str, password: &str) -> PortResult<AuthSession> {
        if password == GOOD_PASSWORD {
            Ok(session_for(self.login_user, "login", 3600))
        } else {
            Err(PortError::Unauthorized)
        }
    }

    async fn sign_up(&self, request: SignUpRequest) -> PortResult<SignUpOutcome> {
        assert_eq!(request.email_redirect_to, format!("{SITE}/auth/callback"));
        assert_eq!(request.code_challenge.len(), 43);
        Ok(SignUpOutcome {
            user: Some(AuthUser {
                id: Uuid::new_v4(),
                email: Some(request.email),
            }),
            session: None,
        })
    }

    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser> {
        if access_token.starts_with("revoked") {
            return Err(PortError::Unauthorized);
        }
        Ok(AuthUser {
            id: user_in(access_token)?,
            email: None,
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> PortResult<AuthSession> {
        Ok(session_for(user_in(refresh_token)?, "fresh", 3600))
    }

    async fn exchange_code_for_session(&self, code: &str, verifier: &str) -> PortResult<AuthSession> {
        match (code, verifier) {
            ("good-code", "the-verifier") => Ok(session_for(self.login_user, "callback", 3600)),
            _ => Err(PortError::Rejected("invalid flow state".to_string())),
        }
    }

    async fn sign_out(&self, access_token: &str) -> PortResult<()> {
        self.signed_out.lock().unwrap().push(access_token.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct StubAdmin {
    deleted: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl AdminAuthService for StubAdmin {
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        self.deleted.lock().unwrap().push(user_id);
        Ok(())
    }
}

#[derive(Default)]
struct StubProfiles {
    rows: Mutex<HashMap<Uuid, Profile>>,
    fail_reads: bool,
}

impl StubProfiles {
    fn insert(&self, profile: Profile) {
        self.rows.lock().unwrap().insert(profile.id, profile);
    }

    fn get(&self, id: Uuid) -> Option<Profile> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Profile)) -> PortResult<Profile> {
        let mut rows = self.rows.lock().unwrap();
        let profile = rows
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {id} not found")))?;
        f(profile);
        Ok(profile.clone())
    }
}

#[async_trait]
impl ProfileRepository for StubProfiles {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        if self.fail_reads {
            return Err(PortError::Unexpected("database down".to_string()));
        }
        Ok(self.get(user_id))
    }

    async fn ensure_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .entry(user_id)
            .or_insert_with(|| Profile::empty(user_id, Utc::now()))
            .clone())
    }

    async fn save_basics(&self, user_id: Uuid, basics: &Basics) -> PortResult<Profile> {
        self.update(user_id, |p| {
            p.display_name = Some(basics.display_name.clone());
            p.birth_date = Some(basics.birth_date);
            p.gender = Some(basics.gender);
            p.onboarding_step = p.onboarding_step.max(1);
        })
    }

    async fn save_preferences(&self, user_id: Uuid, prefs: &Preferences) -> PortResult<Profile> {
        self.update(user_id, |p| {
            p.interested_in = prefs.interested_in.clone();
            p.age_min = Some(prefs.age_min);
            p.age_max = Some(prefs.age_max);
            p.onboarding_step = p.onboarding_step.max(2);
        })
    }

    async fn save_about(&self, user_id: Uuid, about: &About) -> PortResult<Profile> {
        self.update(user_id, |p| {
            p.bio = Some(about.bio.clone());
            p.city = Some(about.city.clone());
            p.interests = about.interests.clone();
            p.onboarding_step = p.onboarding_step.max(3);
        })
    }

    async fn complete_onboarding(&self, user_id: Uuid) -> PortResult<Profile> {
        self.update(user_id, |p| {
            if p.onboarding_step >= 3 && p.registered_at.is_none() {
                p.registered_at = Some(Utc::now());
            }
        })
    }

    async fn list_candidates(
        &self,
        viewer: Uuid,
        filter: &CandidateFilter,
        limit: u32,
        offset: u64,
    ) -> PortResult<CandidatePage> {
        let mut matching: Vec<Profile> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.id != viewer && p.is_registered())
            .filter(|p| match (&filter.genders, p.gender) {
                (Some(wanted), Some(g)) => wanted.contains(&g),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.id);
        let total = matching.len() as u64;
        let profiles = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(CandidatePage { profiles, total })
    }

    async fn delete_profile(&self, user_id: Uuid) -> PortResult<()> {
        self.rows.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

struct FailingLimiter;

#[async_trait]
impl RateLimiter for FailingLimiter {
    async fn check(&self, _key: &str, _policy: &RateLimitPolicy) -> PortResult<RateLimitDecision> {
        Err(PortError::Unexpected("limiter offline".to_string()))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct TestApp {
    router: Router,
    auth: Arc<StubAuth>,
    admin: Arc<StubAdmin>,
    profiles: Arc<StubProfiles>,
}

fn test_config(limit: u32, auth_limit: u32) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://localhost/test".to_string(),
        log_level: tracing::Level::DEBUG,
        supabase_url: "https://testref.supabase.co".parse().unwrap(),
        supabase_anon_key: "anon".to_string(),
        supabase_service_role_key: Some("service".to_string()),
        site_url: SITE.parse().unwrap(),
        cors_allowed_origin: SITE.to_string(),
        cookie_secure: false,
        rate_limit: RateLimitPolicy {
            limit,
            window_secs: 60,
        },
        auth_rate_limit: RateLimitPolicy {
            limit: auth_limit,
            window_secs: 60,
        },
        browse_page_size: 2,
    }
}

fn build_app(config: Config, profiles: StubProfiles, limiter: Arc<dyn RateLimiter>) -> TestApp {
    let auth = Arc::new(StubAuth {
        login_user: Uuid::new_v4(),
        signed_out: Mutex::new(Vec::new()),
    });
    let admin = Arc::new(StubAdmin::default());
    let profiles = Arc::new(profiles);
    let state = Arc::new(AppState {
        config: Arc::new(config),
        auth: auth.clone(),
        admin: admin.clone(),
        profiles: profiles.clone(),
        rate_limiter: limiter,
    });
    TestApp {
        router: build_router(state).unwrap(),
        auth,
        admin,
        profiles,
    }
}

fn app() -> TestApp {
    build_app(
        test_config(100, 10),
        StubProfiles::default(),
        Arc::new(InMemoryRateLimiter::new()),
    )
}

fn registered_profile(id: Uuid) -> Profile {
    let mut p = Profile::empty(id, Utc::now());
    p.display_name = Some("Robin".to_string());
    p.birth_date = NaiveDate::from_ymd_opt(1994, 3, 1);
    p.gender = Some(Gender::Woman);
    p.interested_in = vec![Gender::Woman, Gender::Man];
    p.age_min = Some(18);
    p.age_max = Some(60);
    p.onboarding_step = 3;
    p.registered_at = Some(Utc::now());
    p
}

fn profile_at_step(id: Uuid, step: i16) -> Profile {
    let mut p = Profile::empty(id, Utc::now());
    p.onboarding_step = step;
    p
}

fn session_cookie_header(session: &AuthSession) -> String {
    cookies::session_writes(&[], SESSION_COOKIE, Some(session), &CookieOptions::session(false))
        .into_iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `(name, value)` of every cookie the response sets, removals included.
fn set_cookie_pairs(response: &Response<Body>) -> Vec<(String, String)> {
    set_cookies(response)
        .iter()
        .filter_map(|c| c.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

async fn extract_json_response(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

//=========================================================================================
// Session gate
//=========================================================================================

#[tokio::test]
async fn anonymous_protected_request_redirects_to_login() {
    let app = app();
    let response = send(&app, get("/browse?page=2", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/login?redirectTo=%2Fbrowse"));
}

#[tokio::test]
async fn anonymous_nested_protected_path_keeps_full_path() {
    let app = app();
    let response = send(&app, get("/messages/42", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("{SITE}/login?redirectTo=%2Fmessages%2F42")
    );
}

#[tokio::test]
async fn registered_user_on_auth_page_goes_to_browse() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    let response = send(&app, get("/login", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/browse"));
}

#[tokio::test]
async fn unregistered_user_is_sent_to_onboarding() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(profile_at_step(user, 1));
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    for path in ["/browse", "/register", "/settings"] {
        let response = send(&app, get(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response), format!("{SITE}/onboarding"), "{path}");
    }

    let response = send(&app, get("/onboarding", Some(&cookie))).await;
    let (status, body) = extract_json_response(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "preferences");
    assert_eq!(body["step_number"], 2);
}

#[tokio::test]
async fn registered_user_cannot_revisit_onboarding() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    let response = send(&app, get("/onboarding", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/browse"));
}

#[tokio::test]
async fn profile_lookup_failure_reads_as_unregistered() {
    let app = build_app(
        test_config(100, 10),
        StubProfiles {
            fail_reads: true,
            ..StubProfiles::default()
        },
        Arc::new(InMemoryRateLimiter::new()),
    );
    let cookie = session_cookie_header(&session_for(Uuid::new_v4(), "valid", 3600));

    let response = send(&app, get("/browse", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/onboarding"));
}

#[tokio::test]
async fn revoked_session_is_treated_as_anonymous() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "revoked", 3600));

    let response = send(&app, get("/profile", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/login?redirectTo=%2Fprofile"));

    let response = send(&app, get("/login", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn registered_user_browses_candidates() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    for _ in 0..3 {
        app.profiles.insert(registered_profile(Uuid::new_v4()));
    }
    app.profiles.insert(profile_at_step(Uuid::new_v4(), 2));
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    let response = send(&app, get("/browse?page=2", Some(&cookie))).await;
    let (status, body) = extract_json_response(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 1);
    assert!(body["candidates"][0].get("birth_date").is_none());
}

#[tokio::test]
async fn page_past_the_end_shows_the_last_page() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    for _ in 0..3 {
        app.profiles.insert(registered_profile(Uuid::new_v4()));
    }
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    let response = send(&app, get("/browse?page=9", Some(&cookie))).await;
    let (status, body) = extract_json_response(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 1);

    let response = send(&app, get("/browse?page=0", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn callback_path_is_never_redirected_by_the_gate() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "valid", 3600));

    // A registered user would be bounced off auth pages, but not off the callback.
    let response = send(&app, get("/auth/callback?code=bogus", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("{SITE}/login?error=auth_callback_failed")
    );
}

//=========================================================================================
// Session refresh
//=========================================================================================

fn refreshed_session(response: &Response<Body>) -> Option<AuthSession> {
    cookies::decode_session(&set_cookie_pairs(response), SESSION_COOKIE)
}

#[tokio::test]
async fn expiring_session_is_refreshed_on_pass_through() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "stale", 10));

    let response = send(&app, get("/profile", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = refreshed_session(&response).expect("refreshed session cookie");
    assert_eq!(refreshed.access_token, format!("fresh:{user}"));
}

#[tokio::test]
async fn expiring_session_is_refreshed_on_redirect() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let cookie = session_cookie_header(&session_for(user, "stale", 10));

    let response = send(&app, get("/login", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), format!("{SITE}/browse"));
    let refreshed = refreshed_session(&response).expect("refreshed session cookie");
    assert_eq!(refreshed.access_token, format!("fresh:{user}"));
}

//=========================================================================================
// Request id and rate limiting
//=========================================================================================

fn request_id(response: &Response<Body>) -> Uuid {
    let raw = response.headers()["x-request-id"].to_str().unwrap();
    Uuid::parse_str(raw).unwrap()
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = app();
    let ok = send(&app, get("/login", None)).await;
    let redirect = send(&app, get("/browse", None)).await;
    let health = send(&app, get("/health", None)).await;

    let ids = [request_id(&ok), request_id(&redirect), request_id(&health)];
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
}

#[tokio::test]
async fn exceeding_the_rate_returns_429_with_retry_after() {
    let app = build_app(
        test_config(2, 10),
        StubProfiles::default(),
        Arc::new(InMemoryRateLimiter::new()),
    );
    let request = || {
        Request::builder()
            .uri("/login")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap()
    };

    let first = send(&app, request()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-limit"], "2");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "1");
    assert!(first.headers().contains_key("x-ratelimit-reset"));

    assert_eq!(send(&app, request()).await.status(), StatusCode::OK);

    let throttled = send(&app, request()).await;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(throttled.headers()["x-ratelimit-remaining"], "0");
    let retry_after: i64 = throttled.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    request_id(&throttled);

    let (_, body) = extract_json_response(throttled).await;
    assert!(body["error"].is_string());
    assert_eq!(body["retryAfter"], retry_after);

    // Another client is unaffected.
    let other = Request::builder()
        .uri("/login")
        .header("x-real-ip", "198.51.100.2")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, other).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_posts_use_the_stricter_policy() {
    let app = build_app(
        test_config(100, 1),
        StubProfiles::default(),
        Arc::new(InMemoryRateLimiter::new()),
    );

    let first = send(&app, post_form("/login", None, "email=a%40b.co&password=x")).await;
    assert_ne!(first.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(first.headers()["x-ratelimit-limit"], "1");

    let second = send(&app, post_form("/login", None, "email=a%40b.co&password=x")).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // Page views still use the general bucket.
    assert_eq!(send(&app, get("/login", None)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn limiter_failure_fails_open() {
    let app = build_app(
        test_config(1, 1),
        StubProfiles::default(),
        Arc::new(FailingLimiter),
    );
    for _ in 0..3 {
        let response = send(&app, get("/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn health_skips_the_limiter() {
    let app = build_app(
        test_config(1, 1),
        StubProfiles::default(),
        Arc::new(InMemoryRateLimiter::new()),
    );
    for _ in 0..3 {
        let response = send(&app, get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

//=========================================================================================
// Anti-forgery tokens
//=========================================================================================

#[tokio::test]
async fn csrf_token_is_issued_once() {
    let app = app();
    let response = send(&app, get("/login", None)).await;

    let token = response.headers()["x-csrf-token"].to_str().unwrap().to_string();
    assert!(csrf::is_well_formed(&token));
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(&format!("csrf-token={token};"))));

    let cookie = format!("csrf-token={token}");
    let response = send(&app, get("/login", Some(&cookie))).await;
    assert_eq!(response.headers()["x-csrf-token"], token.as_str());
    assert!(!set_cookies(&response).iter().any(|c| c.starts_with("csrf-token=")));

    let (_, body) = extract_json_response(response).await;
    assert_eq!(body["csrf_token"], token);
}

#[tokio::test]
async fn mismatched_csrf_token_is_forbidden() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!("email=a%40b.co&password={GOOD_PASSWORD}&csrf_token=forged");

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

//=========================================================================================
// Auth handlers
//=========================================================================================

#[tokio::test]
async fn login_sets_session_and_follows_safe_redirect() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password={GOOD_PASSWORD}&csrf_token={token}&redirectTo=%2Fmatches"
    );

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/matches"));
    let session = refreshed_session(&response).expect("session cookie");
    assert_eq!(session.access_token, format!("login:{}", app.auth.login_user));
}

#[tokio::test]
async fn login_ignores_offsite_redirects() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password={GOOD_PASSWORD}&csrf_token={token}&redirectTo=%2F%2Fevil.example"
    );

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;
    assert_eq!(location(&response), format!("{SITE}/browse"));
}

#[tokio::test]
async fn login_ignores_redirects_with_embedded_tabs() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password={GOOD_PASSWORD}&csrf_token={token}&redirectTo=%2F%09%2Fevil.example"
    );

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/browse"));
}

#[tokio::test]
async fn login_accepts_snake_case_redirect_field() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password={GOOD_PASSWORD}&csrf_token={token}&redirect_to=%2Fmessages"
    );

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;
    assert_eq!(location(&response), format!("{SITE}/messages"));
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!("email=a%40b.co&password=wrong&csrf_token={token}");

    let response = send(&app, post_form("/login", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(refreshed_session(&response).is_none());
}

#[tokio::test]
async fn invalid_registration_is_unprocessable() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password=short&confirm_password=other&csrf_token={token}"
    );

    let response = send(&app, post_form("/register", Some(&cookie), &body)).await;
    let (status, body) = extract_json_response(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["password"].is_array());
    assert!(body["details"]["accept_terms"].is_array());
}

#[tokio::test]
async fn registration_awaiting_confirmation_stores_the_verifier() {
    let app = app();
    let token = csrf::generate_token();
    let cookie = format!("csrf-token={token}");
    let body = format!(
        "email=a%40b.co&password=abcd1234&confirm_password=abcd1234&accept_terms=on&csrf_token={token}"
    );

    let response = send(&app, post_form("/register", Some(&cookie), &body)).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let verifier = set_cookie_pairs(&response)
        .into_iter()
        .find(|(name, _)| name == VERIFIER_COOKIE)
        .map(|(_, value)| value)
        .expect("verifier cookie");
    assert_eq!(verifier.len(), 43);
}

#[tokio::test]
async fn callback_exchanges_code_and_clears_verifier() {
    let app = app();
    let cookie = format!("{VERIFIER_COOKIE}=the-verifier");

    let response = send(
        &app,
        get("/auth/callback?code=good-code&next=%2Fbrowse", Some(&cookie)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/browse"));
    let session = refreshed_session(&response).expect("session cookie");
    assert_eq!(session.access_token, format!("callback:{}", app.auth.login_user));
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(&format!("{VERIFIER_COOKIE}=;")) && c.contains("Max-Age=0")));
    assert!(app.profiles.get(app.auth.login_user).is_some());
}

#[tokio::test]
async fn callback_ignores_next_with_embedded_tabs() {
    let app = app();
    let cookie = format!("{VERIFIER_COOKIE}=the-verifier");

    let response = send(
        &app,
        get(
            "/auth/callback?code=good-code&next=%2F%09%2Fevil.example",
            Some(&cookie),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/onboarding"));
}

#[tokio::test]
async fn logout_signs_out_and_clears_cookies() {
    let app = app();
    let user = Uuid::new_v4();
    let token = csrf::generate_token();
    let cookie = format!(
        "{}; csrf-token={token}",
        session_cookie_header(&session_for(user, "valid", 3600))
    );

    let response = send(
        &app,
        post_form("/logout", Some(&cookie), &format!("csrf_token={token}")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/login"));
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(&format!("{SESSION_COOKIE}=;")) && c.contains("Max-Age=0")));
    assert_eq!(
        app.auth.signed_out.lock().unwrap().as_slice(),
        [format!("valid:{user}")]
    );
}

//=========================================================================================
// Onboarding and account deletion
//=========================================================================================

#[tokio::test]
async fn onboarding_steps_must_be_submitted_in_order() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(profile_at_step(user, 0));
    let token = csrf::generate_token();
    let cookie = format!(
        "{}; csrf-token={token}",
        session_cookie_header(&session_for(user, "valid", 3600))
    );

    let body = format!("interested_in=woman&age_min=25&age_max=35&csrf_token={token}");
    let response = send(&app, post_form("/onboarding/preferences", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = format!(
        "display_name=Robin%20Hood&birth_date=1990-04-01&gender=man&csrf_token={token}"
    );
    let response = send(&app, post_form("/onboarding/basics", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/onboarding"));
    assert_eq!(app.profiles.get(user).unwrap().onboarding_step, 1);
}

#[tokio::test]
async fn blank_text_fields_are_rejected_after_trimming() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(profile_at_step(user, 2));
    let token = csrf::generate_token();
    let cookie = format!(
        "{}; csrf-token={token}",
        session_cookie_header(&session_for(user, "valid", 3600))
    );

    let body = format!("bio=Hello&city=%20&interests=hiking&csrf_token={token}");
    let response = send(&app, post_form("/onboarding/about", Some(&cookie), &body)).await;
    let (status, json) = extract_json_response(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["details"]["city"].is_array());
    let profile = app.profiles.get(user).unwrap();
    assert!(!profile.is_registered());
    assert_eq!(profile.city, None);

    let body = format!(
        "display_name=%20J%20&birth_date=1990-04-01&gender=man&csrf_token={token}"
    );
    let response = send(&app, post_form("/onboarding/basics", Some(&cookie), &body)).await;
    let (status, json) = extract_json_response(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["details"]["display_name"].is_array());
    assert_eq!(app.profiles.get(user).unwrap().display_name, None);
}

#[tokio::test]
async fn final_step_completes_onboarding() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(profile_at_step(user, 2));
    let token = csrf::generate_token();
    let cookie = format!(
        "{}; csrf-token={token}",
        session_cookie_header(&session_for(user, "valid", 3600))
    );

    let body = format!("bio=Hello&city=Lisbon&interests=hiking%2Cmusic&csrf_token={token}");
    let response = send(&app, post_form("/onboarding/about", Some(&cookie), &body)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/browse"));
    let profile = app.profiles.get(user).unwrap();
    assert!(profile.is_registered());
    assert_eq!(profile.interests, vec!["hiking", "music"]);

    // The gate now lets the user into the app.
    let response = send(&app, get("/browse", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_account_removes_user_and_profile() {
    let app = app();
    let user = Uuid::new_v4();
    app.profiles.insert(registered_profile(user));
    let token = csrf::generate_token();
    let cookie = format!(
        "{}; csrf-token={token}",
        session_cookie_header(&session_for(user, "valid", 3600))
    );

    let response = send(
        &app,
        post_form(
            "/settings/delete-account",
            Some(&cookie),
            &format!("csrf_token={token}"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{SITE}/"));
    assert_eq!(app.admin.deleted.lock().unwrap().as_slice(), [user]);
    assert!(app.profiles.get(user).is_none());
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with(&format!("{SESSION_COOKIE}=;"))));
}
