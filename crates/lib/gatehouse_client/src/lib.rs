//! # gatehouse_client
//!
//! Rust client for the Gatehouse API. Attaches the current access token to
//! every request and silently renews it on 401: concurrent renewals are
//! collapsed into one refresh exchange, queued requests replay with the new
//! token only after it is stored, and each request replays at most once.

pub mod error;
pub mod models;
pub mod refresh;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::models::{
    AuthUser, ErrorResponse, LoginRequest, LogoutRequest, ProfileResponse, RefreshRequest,
    RegisterRequest, TokenResponse,
};
use crate::refresh::{RefreshFailed, SingleFlight, Ticket};
use crate::session::{SessionStore, SessionTokens};

/// Default ceiling on one refresh exchange. A hung refresh would otherwise
/// hold the single-flight slot and starve every queued request.
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths that must never trigger a refresh of their own.
const AUTH_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// HTTP client with token attachment and the silent-refresh cycle.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionStore,
    refresh: SingleFlight,
    refresh_timeout: Duration,
    inactivity_limit: Option<Duration>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            session: SessionStore::new(),
            refresh: SingleFlight::new(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            inactivity_limit: None,
            on_session_expired: None,
        })
    }

    /// Expire the session after this much idle time.
    pub fn with_inactivity_limit(mut self, limit: Duration) -> Self {
        self.inactivity_limit = Some(limit);
        self
    }

    /// Override the refresh-exchange timeout.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Called whenever the session is cleared and the user must sign in
    /// again (the redirect-to-sign-in analogue).
    pub fn with_session_expired_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// The stored session (tokens + activity).
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Auth operations
    // -----------------------------------------------------------------------

    /// Sign in and store the issued token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login")?)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let tokens: TokenResponse = parse(resp).await?;
        let user = tokens.user.clone();
        self.install(tokens);
        Ok(user)
    }

    /// Create an account and store the issued token pair.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthUser, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/register")?)
            .json(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: name.map(str::to_string),
            })
            .send()
            .await?;
        let tokens: TokenResponse = parse(resp).await?;
        let user = tokens.user.clone();
        self.install(tokens);
        Ok(user)
    }

    /// Revoke the stored refresh token (best effort) and clear the session.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(refresh_token) = self.session.refresh_token() {
            let _ = self
                .http
                .post(self.url("/auth/logout")?)
                .json(&LogoutRequest {
                    refresh_token: Some(refresh_token),
                })
                .send()
                .await;
        }
        self.session.clear();
        Ok(())
    }

    /// Profile of the signed-in user.
    pub async fn me(&self) -> Result<ProfileResponse, ClientError> {
        self.get("/api/me").await
    }

    // -----------------------------------------------------------------------
    // Generic authorized calls
    // -----------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.dispatch(Method::GET, path, None).await?;
        parse(resp).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        let resp = self.dispatch(Method::POST, path, Some(body)).await?;
        parse(resp).await
    }

    // -----------------------------------------------------------------------
    // Refresh cycle
    // -----------------------------------------------------------------------

    /// Send with the current token; on 401, refresh once and replay once.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        self.expire_if_idle()?;
        self.session.touch();

        let url = self.url(path)?;
        let resp = self
            .send_once(&method, &url, body.as_ref(), self.session.access_token())
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED || is_auth_path(path) {
            return Ok(resp);
        }

        debug!(path, "access token rejected, entering refresh cycle");
        let access = self.refresh_access_token().await?;

        // One replay per request: a second 401 is returned as-is rather
        // than looping through refresh again.
        self.send_once(&method, &url, body.as_ref(), Some(access))
            .await
            .map_err(ClientError::from)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        token: Option<String>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut req = self.http.request(method.clone(), url.clone());
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await
    }

    /// Obtain a fresh access token, collapsing concurrent callers into one
    /// refresh exchange.
    async fn refresh_access_token(&self) -> Result<String, ClientError> {
        let Some(refresh_token) = self.session.valid_refresh_token(Utc::now()) else {
            self.expire_session();
            return Err(ClientError::SessionExpired);
        };

        match self.refresh.join() {
            Ticket::Follower(rx) => match rx.await {
                Ok(Ok(access)) => Ok(access),
                // Leader failed (or vanished); it already cleared the session.
                _ => Err(ClientError::SessionExpired),
            },
            Ticket::Leader => {
                let outcome =
                    tokio::time::timeout(self.refresh_timeout, self.call_refresh(refresh_token))
                        .await;
                match outcome {
                    Ok(Ok(tokens)) => {
                        let access = tokens.access_token.clone();
                        // Waiters wake only after the new pair is stored, so
                        // no queued request races ahead of the credential
                        // write.
                        self.install(tokens);
                        self.refresh.settle(Ok(access.clone()));
                        Ok(access)
                    }
                    Ok(Err(e)) => {
                        self.refresh.settle(Err(RefreshFailed));
                        self.expire_session();
                        debug!("refresh exchange failed: {e}");
                        Err(ClientError::SessionExpired)
                    }
                    Err(_elapsed) => {
                        self.refresh.settle(Err(RefreshFailed));
                        self.expire_session();
                        Err(ClientError::RefreshTimeout)
                    }
                }
            }
        }
    }

    async fn call_refresh(&self, refresh_token: String) -> Result<TokenResponse, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/refresh")?)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        parse(resp).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn install(&self, tokens: TokenResponse) {
        self.session.install(SessionTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            refresh_token_expires_at: tokens.refresh_token_expires_at,
        });
    }

    fn expire_if_idle(&self) -> Result<(), ClientError> {
        if let Some(limit) = self.inactivity_limit
            && let Some(idle) = self.session.idle_for()
            && idle > limit
        {
            self.expire_session();
            return Err(ClientError::SessionExpired);
        }
        Ok(())
    }

    fn expire_session(&self) {
        self.session.clear();
        if let Some(hook) = &self.on_session_expired {
            hook();
        }
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Endpoints that must not recurse into the refresh cycle.
fn is_auth_path(path: &str) -> bool {
    AUTH_PATHS.iter().any(|p| path.contains(p))
}

/// Decode a success body, or map an error body onto `ClientError::Api`.
async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let message = resp
        .json::<ErrorResponse>()
        .await
        .map(|e| e.message)
        .unwrap_or_else(|_| status.to_string());
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
