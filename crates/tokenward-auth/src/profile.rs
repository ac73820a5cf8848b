//! Downstream profile sync
//!
//! After sign-in the raw provider profile can be pushed to another service.
//! Whether a failure here fails the sign-in is decided by
//! [`ProfileSyncPolicy`](crate::config::ProfileSyncPolicy).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::config::DEFAULT_HTTP_TIMEOUT;
use crate::error::{AuthError, AuthResult};

/// Receiver of raw provider profiles
#[async_trait]
pub trait ProfileSyncer: Send + Sync + std::fmt::Debug {
    /// Push `data` for `user_id`
    async fn update(
        &self,
        user_id: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> AuthResult<()>;
}

/// Discards profiles
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfileSyncer;

#[async_trait]
impl ProfileSyncer for NoopProfileSyncer {
    async fn update(
        &self,
        _user_id: &str,
        _data: &serde_json::Map<String, serde_json::Value>,
    ) -> AuthResult<()> {
        Ok(())
    }
}

/// Posts `{"id": user_id, "data": profile}` to an endpoint
pub struct HttpProfileSyncer {
    http: reqwest::Client,
    endpoint: String,
    auth_header: String,
    auth_token: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for HttpProfileSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProfileSyncer")
            .field("endpoint", &self.endpoint)
            .field("auth_header", &self.auth_header)
            .field("auth_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpProfileSyncer {
    /// Create a syncer for `endpoint`, authenticating with `auth_header: auth_token`
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        auth_header: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            auth_header: auth_header.into(),
            auth_token: SecretString::new(auth_token.into()),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Bound each push to `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProfileSyncer for HttpProfileSyncer {
    async fn update(
        &self,
        user_id: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> AuthResult<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(self.auth_header.as_str(), self.auth_token.expose_secret())
            .json(&json!({ "id": user_id, "data": data }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::ProfileSync(format!("request failed: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ProfileSync(format!(
                "profile service returned {status}: {body}"
            )));
        }

        debug!(user_id = %user_id, "profile synced");
        Ok(())
    }
}
