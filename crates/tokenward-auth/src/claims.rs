//! Extra JWT claims
//!
//! A [`ClaimsProvider`] supplies additional claims for a user at issuance time. A failing
//! lookup fails the issuance: tokens are never minted with a partial claim set.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json_path::JsonPath;
use tracing::{debug, warn};

use crate::config::DEFAULT_HTTP_TIMEOUT;
use crate::error::{AuthError, AuthResult};
use crate::types::ExtraClaims;

/// Source of extra claims for a user
#[async_trait]
pub trait ClaimsProvider: Send + Sync + std::fmt::Debug {
    /// Claims to add to the access token of `user_id`
    async fn get_claims(&self, user_id: &str) -> AuthResult<ExtraClaims>;
}

/// Adds no claims
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClaims;

#[async_trait]
impl ClaimsProvider for NoClaims {
    async fn get_claims(&self, _user_id: &str) -> AuthResult<ExtraClaims> {
        Ok(Vec::new())
    }
}

/// Fixed claims for every user
#[derive(Debug, Clone, Default)]
pub struct StaticClaims(ExtraClaims);

impl StaticClaims {
    /// Create a provider returning `claims`
    #[must_use]
    pub fn new(claims: ExtraClaims) -> Self {
        Self(claims)
    }
}

#[async_trait]
impl ClaimsProvider for StaticClaims {
    async fn get_claims(&self, _user_id: &str) -> AuthResult<ExtraClaims> {
        Ok(self.0.clone())
    }
}

/// Fetches claims from `GET {endpoint}{user_id}`
///
/// The claims object is selected from the response body with a JSONPath expression
/// (`$` for the whole body, `$.user.claims` for a nested object). The expression must
/// match exactly one node and that node must be an object.
pub struct HttpClaimsProvider {
    http: reqwest::Client,
    endpoint: String,
    json_path: String,
    selector: JsonPath,
    auth_header: String,
    auth_token: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for HttpClaimsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClaimsProvider")
            .field("endpoint", &self.endpoint)
            .field("json_path", &self.json_path)
            .field("auth_header", &self.auth_header)
            .field("auth_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpClaimsProvider {
    /// Create a provider for `endpoint`, authenticating with `auth_header: auth_token`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `json_path` is not a valid JSONPath
    /// expression.
    pub fn new(
        endpoint: impl Into<String>,
        json_path: impl Into<String>,
        auth_header: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> AuthResult<Self> {
        let json_path = json_path.into();
        let selector = JsonPath::parse(&json_path).map_err(|e| {
            AuthError::Configuration(format!("invalid claims JSONPath '{json_path}': {e}"))
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            json_path,
            selector,
            auth_header: auth_header.into(),
            auth_token: SecretString::new(auth_token.into()),
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Bound each lookup to `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ClaimsProvider for HttpClaimsProvider {
    async fn get_claims(&self, user_id: &str) -> AuthResult<ExtraClaims> {
        let url = format!("{}{}", self.endpoint, user_id);

        let response = self
            .http
            .get(&url)
            .header(self.auth_header.as_str(), self.auth_token.expose_secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::Claims(format!("request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::Claims(format!("invalid response (status {status}): {e}")))?;

        if status != reqwest::StatusCode::OK {
            warn!(user_id = %user_id, status = %status, "claims service rejected lookup");
            return Err(AuthError::Claims(format!("claims service returned {status}")));
        }

        let selected = self.selector.query(&body).exactly_one().map_err(|e| {
            AuthError::Claims(format!("{} in claims response: {e}", self.json_path))
        })?;
        let serde_json::Value::Object(claims) = selected else {
            return Err(AuthError::Claims("claims must be a JSON object".to_string()));
        };

        debug!(user_id = %user_id, count = claims.len(), "claims fetched");
        Ok(claims.clone().into_iter().collect())
    }
}
