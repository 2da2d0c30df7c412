//! Password sign-in against the hosted auth service.
//!
//! The session lives in memory only; restarting the app signs the user out.
//! Expired access tokens are swapped for new ones with the refresh token; a
//! rejected refresh drops the session, so `current_user` turns `None`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::models::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds. Filled from `expires_in` when the server omits it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 30;

impl Session {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expires_at
            .map(|at| at - EXPIRY_LEEWAY_SECS <= now_unix)
            .unwrap_or(false)
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Current session shared between the auth client and the store client.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().and_then(|s| s.refresh_token.clone())
    }

    /// True when a session exists, its token is (nearly) expired and it can
    /// be refreshed.
    pub fn needs_refresh(&self, now_unix: i64) -> bool {
        self.read()
            .as_ref()
            .map(|s| s.refresh_token.is_some() && s.is_expired(now_unix))
            .unwrap_or(false)
    }

    pub fn set(&self, mut session: Session) {
        if session.expires_at.is_none() {
            session.expires_at = session.expires_in.map(|secs| now_unix() + secs);
        }
        *self.write() = Some(session);
    }

    pub fn clear(&self) -> Option<Session> {
        self.write().take()
    }

    /// Writes are scoped to the signed-in employee.
    pub fn require_user(&self) -> Result<User> {
        self.current_user().ok_or(AppError::NotSignedIn)
    }
}

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: StoreConfig,
    sessions: Arc<SessionStore>,
}

impl AuthClient {
    pub fn new(http: reqwest::Client, config: StoreConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            http,
            config,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn current_user(&self) -> Option<User> {
        self.sessions.current_user()
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let resp = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let message = auth_error_message(&body);
            tracing::warn!(status = status.as_u16(), %message, "sign-in rejected");
            return Err(AppError::Auth(message));
        }

        let session: Session = resp.json().await?;
        tracing::info!(user_id = %session.user.id, "signed in");
        let user = session.user.clone();
        self.sessions.set(session);
        Ok(user)
    }

    /// Swaps the refresh token for a new session.
    pub async fn refresh(&self) -> Result<User> {
        let session = refresh_session(&self.http, &self.config, &self.sessions).await?;
        Ok(session.user)
    }

    /// Clears the local session even when the remote logout fails.
    #[tracing::instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.sessions.clear() else {
            return Ok(());
        };

        let result = self
            .http
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(user_id = %session.user.id, "signed out");
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "remote logout rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote logout failed");
            }
        }
        Ok(())
    }
}

/// Exchanges the stored refresh token for a new session and stores it.
/// A rejected or missing refresh token clears the session; a transport
/// failure leaves it in place.
pub(crate) async fn refresh_session(
    http: &reqwest::Client,
    config: &StoreConfig,
    sessions: &SessionStore,
) -> Result<Session> {
    let Some(refresh_token) = sessions.refresh_token() else {
        if let Some(old) = sessions.clear() {
            tracing::warn!(user_id = %old.user.id, "session expired without refresh token");
        }
        return Err(AppError::NotSignedIn);
    };

    let resp = http
        .post(config.auth_url("token"))
        .query(&[("grant_type", "refresh_token")])
        .header("apikey", &config.anon_key)
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = auth_error_message(&body);
        tracing::warn!(status = status.as_u16(), %message, "session refresh rejected, signing out");
        sessions.clear();
        return Err(AppError::Auth(message));
    }

    let session: Session = resp.json().await?;
    tracing::info!(user_id = %session.user.id, "session refreshed");
    sessions.set(session.clone());
    Ok(session)
}

fn auth_error_message(body: &Value) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or("sign-in failed")
        .to_string()
}
