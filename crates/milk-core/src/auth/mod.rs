//! Supabase auth (GoTrue) client.
//!
//! Covers email/password sign-up and sign-in, token refresh, sign-out,
//! current-user lookup and the password recovery flow. Sessions are handed
//! to a [`SessionPersistence`] implementation chosen by the caller.

mod recovery;

use std::fmt;
use std::sync::{Arc, Mutex};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{normalize_base_url, unix_timestamp_now};

pub use recovery::RecoveryFragment;

const EXPIRY_SKEW_SECONDS: i64 = 60;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured for this build.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Invalid recovery link: {0}")]
    InvalidRecoveryLink(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Process-local session storage, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        self.session
            .lock()
            .map(|session| session.clone())
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load the persisted session, refreshing it when the token has expired.
    ///
    /// A session that can no longer be refreshed is cleared.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response: SupabaseAuthResponse = Self::send_json(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response: SupabaseAuthResponse = Self::send_json(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response: SupabaseAuthResponse = Self::send_json(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally.
    ///
    /// An already-invalid token (401) still counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .user_request(
                self.client.post(format!("{}/logout", self.auth_url)),
                access_token,
            )
            .send()
            .await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }

    pub async fn current_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let request = self.user_request(
            self.client.get(format!("{}/user", self.auth_url)),
            access_token,
        );
        let user: SupabaseUser = Self::send_json(request).await?;
        Ok(user.into())
    }

    /// Ask the backend to email a password reset link.
    pub async fn request_password_recovery(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> AuthResult<()> {
        if email.trim().is_empty() {
            return Err(AuthError::Api("Email is required".to_string()));
        }

        let mut request = self
            .client
            .post(format!("{}/recover", self.auth_url))
            .json(&serde_json::json!({ "email": email.trim() }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = self.public_request(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> AuthResult<AuthUser> {
        validate_password(new_password)?;

        let request = self.user_request(
            self.client
                .put(format!("{}/user", self.auth_url))
                .json(&serde_json::json!({ "password": new_password })),
            access_token,
        );
        let user: SupabaseUser = Self::send_json(request).await?;
        Ok(user.into())
    }

    /// Turn a recovery link into a persisted session and set the new password.
    pub async fn complete_recovery(
        &self,
        fragment: &RecoveryFragment,
        new_password: &str,
    ) -> AuthResult<AuthSession> {
        let user = self
            .update_password(&fragment.access_token, new_password)
            .await?;
        let session = AuthSession {
            access_token: fragment.access_token.clone(),
            refresh_token: fragment.refresh_token.clone(),
            expires_at: fragment.expires_at,
            user,
        };
        self.store.save_session(&session)?;
        Ok(session)
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    fn user_request(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(request: RequestBuilder) -> AuthResult<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<T>().await?)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    if url.trim().is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    let Some(base) = normalize_base_url(url) else {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    };
    if base.ends_with("/auth/v1") {
        Ok(base)
    } else {
        Ok(format!("{base}/auth/v1"))
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Api(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    /// Accepts both the flat token response and the nested `session` shape
    /// returned by sign-up.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|s| s.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|s| s.refresh_token.clone()));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|s| s.expires_at))
            .or_else(|| {
                self.expires_in
                    .or_else(|| nested.as_ref().and_then(|s| s.expires_in))
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            });
        let user = self
            .user
            .or_else(|| nested.and_then(|s| s.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .msg
            .or(payload.message)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::spawn_one_shot_server;

    fn client(base_url: &str) -> SupabaseAuthClient<MemorySessionStore> {
        SupabaseAuthClient::new(base_url, "anon", MemorySessionStore::new()).unwrap()
    }

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        assert_eq!(
            normalize_auth_url("https://demo.supabase.co/").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert_eq!(
            normalize_auth_url("https://demo.supabase.co/auth/v1").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert!(normalize_auth_url("demo.supabase.co").is_err());
    }

    #[test]
    fn response_without_session_fields_means_confirmation_required() {
        let response: SupabaseAuthResponse =
            serde_json::from_str(r#"{"user":{"id":"user","email":"user@example.com"}}"#).unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn nested_session_is_accepted() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{"session":{"access_token":"a","refresh_token":"r","expires_at":1700000000,"user":{"id":"u","email":null}}}"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.id, "u");
        assert_eq!(session.expires_at, 1_700_000_000);
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn api_error_prefers_msg_field() {
        let message = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"msg":"Invalid login credentials","error":"invalid_grant"}"#,
        );
        assert_eq!(message, "Invalid login credentials (400)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, " "), "HTTP 502");
    }

    #[tokio::test]
    async fn sign_in_persists_session() {
        let body = r#"{"access_token":"access","refresh_token":"refresh","expires_in":3600,"user":{"id":"user-1","email":"ana@example.com"}}"#;
        let (base_url, request) = spawn_one_shot_server("200 OK", body).await;

        let client = client(&base_url);
        let session = client.sign_in("ana@example.com", "hunter22").await.unwrap();

        assert_eq!(session.user.id, "user-1");
        assert!(!session.is_expired());
        assert_eq!(client.store().load_session().unwrap(), Some(session));
        let request = request.await.unwrap();
        assert!(request.starts_with("POST /auth/v1/token?grant_type=password"));
    }

    #[tokio::test]
    async fn sign_in_rejects_blank_credentials_without_request() {
        let client = client("http://127.0.0.1:9");
        assert!(matches!(
            client.sign_in(" ", "secret").await,
            Err(AuthError::Api(_))
        ));
    }

    #[tokio::test]
    async fn sign_in_surfaces_backend_message() {
        let (base_url, _request) = spawn_one_shot_server(
            "400 Bad Request",
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .await;

        let error = client(&base_url)
            .sign_in("ana@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn current_user_uses_access_token() {
        let (base_url, request) =
            spawn_one_shot_server("200 OK", r#"{"id":"user-1","email":"ana@example.com"}"#).await;

        let user = client(&base_url).current_user("user-token").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        let request = request.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /auth/v1/user"));
        assert!(request.contains("authorization: bearer user-token"));
    }

    #[tokio::test]
    async fn recovery_request_posts_email() {
        let (base_url, request) = spawn_one_shot_server("200 OK", "{}").await;

        client(&base_url)
            .request_password_recovery("ana@example.com", Some("https://app.example.com/reset"))
            .await
            .unwrap();
        let request = request.await.unwrap();
        assert!(request.starts_with("POST /auth/v1/recover?redirect_to="));
        assert!(request.contains(r#""email":"ana@example.com""#));
    }

    #[tokio::test]
    async fn complete_recovery_updates_password_and_saves_session() {
        let (base_url, request) =
            spawn_one_shot_server("200 OK", r#"{"id":"user-1","email":"ana@example.com"}"#).await;
        let fragment = RecoveryFragment::parse(
            "#access_token=recovery-token&refresh_token=refresh&expires_in=3600&type=recovery",
        )
        .unwrap();

        let client = client(&base_url);
        let session = client
            .complete_recovery(&fragment, "new-password")
            .await
            .unwrap();

        assert_eq!(session.access_token, "recovery-token");
        assert_eq!(session.user.id, "user-1");
        assert_eq!(client.store().load_session().unwrap(), Some(session));
        let request = request.await.unwrap();
        assert!(request.starts_with("PUT /auth/v1/user"));
        assert!(request.contains(r#""password":"new-password""#));
    }

    #[tokio::test]
    async fn short_password_is_rejected_locally() {
        let client = client("http://127.0.0.1:9");
        assert!(client.update_password("token", "abc").await.is_err());
    }

    #[tokio::test]
    async fn restore_returns_unexpired_session_without_request() {
        let store = MemorySessionStore::new();
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: "u".to_string(),
                email: None,
            },
        };
        store.save_session(&session).unwrap();

        let client = SupabaseAuthClient::new("http://127.0.0.1:9", "anon", store).unwrap();
        assert_eq!(client.restore_session().await.unwrap(), Some(session));
    }
}
