//! services/web/src/adapters/supabase_auth.rs
//!
//! Adapters for the hosted auth provider (Supabase GoTrue REST API). They
//! implement the `AuthService` and `AdminAuthService` ports from the `core` crate.
//! Only the provider's public HTTP endpoints are called; sessions, tokens and
//! password handling stay with the provider.

use async_trait::async_trait;
use chrono::Utc;
use matchmaking_core::domain::{AuthSession, AuthUser, SignUpOutcome, SignUpRequest};
use matchmaking_core::ports::{AdminAuthService, AuthService, PortError, PortResult};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, ConfigError};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl TokenResponse {
    fn into_domain(self) -> AuthSession {
        // Older provider versions omit `expires_at`.
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in);
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in: self.expires_in,
            expires_at,
            user: self.user,
        }
    }
}

/// The provider reports errors in a couple of shapes depending on the endpoint.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| "request rejected by auth provider".to_string())
    }
}

//=========================================================================================
// Shared HTTP plumbing
//=========================================================================================

#[derive(Clone)]
struct GoTrue {
    http: Client,
    base: String,
    api_key: String,
}

impl GoTrue {
    fn new(http: Client, supabase_url: &Url, api_key: String) -> Self {
        Self {
            http,
            base: format!("{}/auth/v1", supabase_url.as_str().trim_end_matches('/')),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base, path))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Sends the request and maps provider failures onto `PortError`.
    async fn send(&self, request: RequestBuilder) -> PortResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("auth provider unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body.into_message();
        debug!(%status, %message, "Auth provider rejected request");
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
            StatusCode::NOT_FOUND => PortError::NotFound(message),
            s if s.is_client_error() => PortError::Rejected(message),
            _ => PortError::Unexpected(format!("auth provider returned {status}: {message}")),
        })
    }

    async fn token(&self, grant_type: &str, body: Value) -> PortResult<AuthSession> {
        let request = self
            .request(reqwest::Method::POST, "token", &self.api_key)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let token: TokenResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed token response: {e}")))?;
        Ok(token.into_domain())
    }
}

//=========================================================================================
// Public-key client
//=========================================================================================

/// Talks to the provider with the public (anon) key on behalf of end users.
#[derive(Clone)]
pub struct SupabaseAuthAdapter {
    inner: GoTrue,
}

impl SupabaseAuthAdapter {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            inner: GoTrue::new(http, &config.supabase_url, config.supabase_anon_key.clone()),
        }
    }
}

#[async_trait]
impl AuthService for SupabaseAuthAdapter {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let result = self
            .inner
            .token("password", json!({ "email": email, "password": password }))
            .await;
        // The provider answers bad credentials with 400; callers want that to read as 401.
        match result {
            Err(PortError::Rejected(_)) => Err(PortError::Unauthorized),
            other => other,
        }
    }

    async fn sign_up(&self, request: SignUpRequest) -> PortResult<SignUpOutcome> {
        let http_request = self
            .inner
            .request(reqwest::Method::POST, "signup", &self.inner.api_key)
            .query(&[("redirect_to", request.email_redirect_to.as_str())])
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "code_challenge": request.code_challenge,
                "code_challenge_method": "s256",
            }));
        let body: Value = self
            .inner
            .send(http_request)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed sign-up response: {e}")))?;

        // With email confirmation enabled the provider returns only the user.
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|e| PortError::Unexpected(format!("malformed sign-up session: {e}")))?;
            let session = token.into_domain();
            Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user = serde_json::from_value::<AuthUser>(body)
                .map_err(|e| warn!("Sign-up response carried no usable user: {}", e))
                .ok();
            Ok(SignUpOutcome { user, session: None })
        }
    }

    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser> {
        let request = self.inner.request(reqwest::Method::GET, "user", access_token);
        self.inner
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed user response: {e}")))
    }

    async fn refresh_session(&self, refresh_token: &str) -> PortResult<AuthSession> {
        self.inner
            .token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> PortResult<AuthSession> {
        self.inner
            .token(
                "pkce",
                json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            )
            .await
    }

    async fn sign_out(&self, access_token: &str) -> PortResult<()> {
        let request = self
            .inner
            .request(reqwest::Method::POST, "logout", access_token)
            .query(&[("scope", "local")]);
        self.inner.send(request).await?;
        Ok(())
    }
}

//=========================================================================================
// Service-role client
//=========================================================================================

/// Privileged client using the service-role key. Never exposed to end users.
#[derive(Clone)]
pub struct SupabaseAdminAdapter {
    inner: GoTrue,
}

impl SupabaseAdminAdapter {
    /// Fails when `SUPABASE_SERVICE_ROLE_KEY` is not configured.
    pub fn from_config(http: Client, config: &Config) -> Result<Self, ConfigError> {
        let key = config
            .supabase_service_role_key
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("SUPABASE_SERVICE_ROLE_KEY".to_string()))?;
        Ok(Self {
            inner: GoTrue::new(http, &config.supabase_url, key),
        })
    }
}

#[async_trait]
impl AdminAuthService for SupabaseAdminAdapter {
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let request = self.inner.request(
            reqwest::Method::DELETE,
            &format!("admin/users/{user_id}"),
            &self.inner.api_key,
        );
        self.inner.send(request).await?;
        Ok(())
    }
}
