//! OAuth 2.0 authorization-code provider
//!
//! Implements [`OAuthProvider`] with the `oauth2` crate: PKCE (S256) on the authorization
//! request, the session code as `state`, code exchange at the token endpoint and a
//! bearer-authenticated userinfo fetch.

use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{OAuthProvider, ProviderSession};
use crate::config::DEFAULT_HTTP_TIMEOUT;
use crate::error::{AuthError, AuthResult, ProviderError, ProviderOperation};
use crate::types::{CallbackParams, ExternalProfile};

type AuthCodeClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const USER_AGENT: &str = concat!("tokenward/", env!("CARGO_PKG_VERSION"));

/// Well-known provider endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPreset {
    /// Google
    Google,
    /// GitHub
    GitHub,
    /// Microsoft identity platform (common tenant)
    Microsoft,
    /// GitLab.com
    GitLab,
}

impl ProviderPreset {
    /// Registry name used for this preset
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Microsoft => "microsoft",
            Self::GitLab => "gitlab",
        }
    }

    /// All presets
    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::Google, Self::GitHub, Self::Microsoft, Self::GitLab]
    }

    fn auth_url(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::GitHub => "https://github.com/login/oauth/authorize",
            Self::Microsoft => "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            Self::GitLab => "https://gitlab.com/oauth/authorize",
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::GitHub => "https://github.com/login/oauth/access_token",
            Self::Microsoft => "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            Self::GitLab => "https://gitlab.com/oauth/token",
        }
    }

    fn userinfo_url(self) -> &'static str {
        match self {
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Self::GitHub => "https://api.github.com/user",
            Self::Microsoft => "https://graph.microsoft.com/v1.0/me",
            Self::GitLab => "https://gitlab.com/api/v4/user",
        }
    }

    fn scopes(self) -> Vec<String> {
        let scopes: &[&str] = match self {
            Self::Google => &["openid", "email", "profile"],
            Self::GitHub => &["user:email", "read:user"],
            Self::Microsoft => &["openid", "profile", "email", "User.Read"],
            Self::GitLab => &["read_user", "openid"],
        };
        scopes.iter().map(|s| (*s).to_string()).collect()
    }
}

/// Endpoints and credentials of one OAuth 2.0 provider
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuth2ProviderConfig {
    /// Registry name
    pub name: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    #[serde(
        serialize_with = "crate::config::serialize_secret",
        deserialize_with = "crate::config::deserialize_secret"
    )]
    pub client_secret: SecretString,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Userinfo endpoint
    pub userinfo_url: String,
    /// Endpoint listing the user's addresses, queried when userinfo has no email
    #[serde(default)]
    pub emails_url: Option<String>,
    /// Callback URL registered with the provider
    pub redirect_url: String,
    /// Scopes to request
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Send a PKCE challenge with the authorization request
    #[serde(default = "default_use_pkce")]
    pub use_pkce: bool,
    /// Bound on each token exchange and userinfo request
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_use_pkce() -> bool {
    true
}

fn default_timeout() -> Duration {
    DEFAULT_HTTP_TIMEOUT
}

impl std::fmt::Debug for OAuth2ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2ProviderConfig")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("emails_url", &self.emails_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("use_pkce", &self.use_pkce)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OAuth2ProviderConfig {
    /// Configuration for a well-known provider
    #[must_use]
    pub fn preset(
        preset: ProviderPreset,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            name: preset.name().to_string(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            auth_url: preset.auth_url().to_string(),
            token_url: preset.token_url().to_string(),
            userinfo_url: preset.userinfo_url().to_string(),
            emails_url: (preset == ProviderPreset::GitHub)
                .then(|| "https://api.github.com/user/emails".to_string()),
            redirect_url: redirect_url.into(),
            scopes: preset.scopes(),
            use_pkce: true,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Configuration for a provider with explicit endpoints
    #[must_use]
    pub fn generic(
        name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            userinfo_url: userinfo_url.into(),
            emails_url: None,
            redirect_url: redirect_url.into(),
            scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
            use_pkce: true,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Replace the requested scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Replace the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Email entry returned by a provider emails endpoint
#[derive(Debug, Deserialize)]
struct EmailEntry {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// [`OAuthProvider`] backed by the `oauth2` crate
#[derive(Debug)]
pub struct OAuth2Provider {
    name: String,
    client: AuthCodeClient,
    http: reqwest::Client,
    userinfo_url: String,
    emails_url: Option<String>,
    scopes: Vec<String>,
    use_pkce: bool,
}

impl OAuth2Provider {
    /// Create a provider from its configuration
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for malformed endpoint URLs or if the HTTP
    /// client cannot be built.
    pub fn new(config: OAuth2ProviderConfig) -> AuthResult<Self> {
        let invalid = |field: &str, e: url::ParseError| {
            AuthError::Configuration(format!("{}: invalid {field}: {e}", config.name))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().clone(),
            ))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone()).map_err(|e| invalid("auth url", e))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token url", e))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| invalid("redirect url", e))?,
            );

        url::Url::parse(&config.userinfo_url).map_err(|e| invalid("userinfo url", e))?;

        // Redirects are not followed during the token exchange
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            name: config.name,
            client,
            http,
            userinfo_url: config.userinfo_url,
            emails_url: config.emails_url,
            scopes: config.scopes,
            use_pkce: config.use_pkce,
        })
    }

    async fn get_json(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let fetch_error = |msg: String| ProviderError::new(ProviderOperation::FetchUser, msg);

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| fetch_error(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("{url} returned status {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| fetch_error(format!("invalid response from {url}: {e}")))
    }

    async fn primary_email(&self, url: &str, access_token: &str) -> Option<String> {
        let body = match self.get_json(url, access_token).await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "email lookup failed");
                return None;
            }
        };
        let entries: Vec<EmailEntry> = serde_json::from_value(body).ok()?;
        entries
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| entries.iter().find(|e| e.verified))
            .map(|e| e.email.clone())
    }
}

#[async_trait]
impl OAuthProvider for OAuth2Provider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin_auth(&self, state: &str) -> Result<ProviderSession, ProviderError> {
        let state_value = state.to_string();
        let mut request = self.client.authorize_url(move || CsrfToken::new(state_value));
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let mut verifier = None;
        if self.use_pkce {
            let (challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
            request = request.set_pkce_challenge(challenge);
            verifier = Some(pkce_verifier.secret().clone());
        }

        let (auth_url, _) = request.url();
        debug!(provider = %self.name, pkce = self.use_pkce, "authorization url built");

        let mut session = ProviderSession::new(state, auth_url.to_string());
        session.pkce_verifier = verifier;
        Ok(session)
    }

    async fn authorize(
        &self,
        session: &mut ProviderSession,
        params: &CallbackParams,
    ) -> Result<(), ProviderError> {
        let rejected = |msg: String| ProviderError::new(ProviderOperation::Authorize, msg);

        if let Some(error) = params.get("error") {
            let description = params.get("error_description").unwrap_or_default();
            return Err(rejected(format!("provider returned {error}: {description}")));
        }
        if params.get("state").is_some_and(|state| state != session.state) {
            return Err(rejected("state mismatch".to_string()));
        }
        let code = params
            .get("code")
            .ok_or_else(|| rejected("missing authorization code".to_string()))?;

        let mut request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = &session.pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.clone()));
        }

        let token = request
            .request_async(&self.http)
            .await
            .map_err(|e| rejected(format!("token exchange failed: {e}")))?;

        debug!(provider = %self.name, "authorization code exchanged");
        session.access_token = Some(token.access_token().secret().clone());
        Ok(())
    }

    async fn fetch_user(
        &self,
        session: &ProviderSession,
    ) -> Result<ExternalProfile, ProviderError> {
        let access_token = session.access_token.as_deref().ok_or_else(|| {
            ProviderError::new(ProviderOperation::FetchUser, "session is not authorized")
        })?;

        let body = self.get_json(&self.userinfo_url, access_token).await?;
        let serde_json::Value::Object(raw) = body else {
            return Err(ProviderError::new(
                ProviderOperation::FetchUser,
                "userinfo response is not an object",
            ));
        };

        let mut profile = ExternalProfile::from_raw(raw);
        if profile.email.is_none() {
            profile.email = profile
                .raw
                .get("mail")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        if profile.email.is_none()
            && let Some(url) = &self.emails_url
        {
            profile.email = self.primary_email(url, access_token).await;
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OAuth2ProviderConfig {
        OAuth2ProviderConfig::generic(
            "mock",
            "client-id",
            "client-secret",
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
            "http://localhost:3000/mock/callback",
        )
    }

    #[test]
    fn test_presets() {
        let config =
            OAuth2ProviderConfig::preset(ProviderPreset::GitHub, "id", "secret", "http://cb");
        assert_eq!(config.name, "github");
        assert!(config.emails_url.is_some());
        assert!(OAuth2Provider::new(config).is_ok());

        for preset in ProviderPreset::all() {
            let config = OAuth2ProviderConfig::preset(preset, "id", "secret", "http://cb");
            assert_eq!(OAuth2Provider::new(config).unwrap().name(), preset.name());
        }
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let mut config =
            OAuth2ProviderConfig::preset(ProviderPreset::Google, "id", "secret", "http://cb");
        config.token_url = "not a url".to_string();
        assert!(matches!(
            OAuth2Provider::new(config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_debug_hides_secret() {
        let config =
            OAuth2ProviderConfig::preset(ProviderPreset::Google, "id", "very-secret", "http://cb");
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[tokio::test]
    async fn test_begin_auth_sets_state_and_pkce() {
        let server = MockServer::start().await;
        let provider = OAuth2Provider::new(config_for(&server)).unwrap();

        let session = provider.begin_auth("the-code").await.unwrap();
        let url = url::Url::parse(session.auth_url().unwrap()).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(query["state"], "the-code");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["scope"], "openid email profile");
        assert!(session.pkce_verifier.is_some());
        assert!(!session.is_authorized());
    }

    #[tokio::test]
    async fn test_authorize_and_fetch_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "provider-access",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer provider-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "123",
                "email": "jane@example.com",
                "name": "Jane"
            })))
            .mount(&server)
            .await;

        let provider = OAuth2Provider::new(config_for(&server)).unwrap();
        let mut session = provider.begin_auth("state-x").await.unwrap();
        let params = CallbackParams::new()
            .with("state", "state-x")
            .with("code", "auth-code");

        provider.authorize(&mut session, &params).await.unwrap();
        assert!(session.is_authorized());

        let profile = provider.fetch_user(&session).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("jane@example.com"));
        assert_eq!(profile.raw["sub"], "123");
    }

    #[tokio::test]
    async fn test_authorize_rejections() {
        let server = MockServer::start().await;
        let provider = OAuth2Provider::new(config_for(&server)).unwrap();
        let mut session = provider.begin_auth("state-x").await.unwrap();

        let denied = CallbackParams::new().with("error", "access_denied");
        let err = provider.authorize(&mut session, &denied).await.unwrap_err();
        assert_eq!(err.operation, ProviderOperation::Authorize);

        let wrong_state = CallbackParams::new()
            .with("state", "other")
            .with("code", "c");
        let err = provider
            .authorize(&mut session, &wrong_state)
            .await
            .unwrap_err();
        assert!(err.message.contains("state mismatch"));

        let no_code = CallbackParams::new().with("state", "state-x");
        assert!(provider.authorize(&mut session, &no_code).await.is_err());
    }

    #[tokio::test]
    async fn test_token_endpoint_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let provider = OAuth2Provider::new(config_for(&server)).unwrap();
        let mut session = provider.begin_auth("s").await.unwrap();
        let params = CallbackParams::new().with("code", "expired-code");
        let err = provider.authorize(&mut session, &params).await.unwrap_err();
        assert_eq!(err.operation, ProviderOperation::Authorize);
        assert!(!session.is_authorized());
    }

    #[tokio::test]
    async fn test_slow_token_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "access_token": "late",
                        "token_type": "bearer"
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = config_for(&server).with_timeout(Duration::from_millis(100));
        let provider = OAuth2Provider::new(config).unwrap();
        let mut session = provider.begin_auth("s").await.unwrap();
        let params = CallbackParams::new().with("code", "c");

        let err = provider.authorize(&mut session, &params).await.unwrap_err();
        assert_eq!(err.operation, ProviderOperation::Authorize);
        assert!(!session.is_authorized());
    }

    #[tokio::test]
    async fn test_fetch_user_falls_back_to_emails_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"login": "octo", "email": null})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"email": "old@example.com", "primary": false, "verified": true},
                {"email": "octo@example.com", "primary": true, "verified": true}
            ])))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.emails_url = Some(format!("{}/emails", server.uri()));
        let provider = OAuth2Provider::new(config).unwrap();

        let mut session = ProviderSession::new("s", "http://x");
        session.access_token = Some("tok".into());
        let profile = provider.fetch_user(&session).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("octo@example.com"));
        assert_eq!(profile.name.as_deref(), Some("octo"));
    }

    #[tokio::test]
    async fn test_fetch_user_requires_authorized_session() {
        let server = MockServer::start().await;
        let provider = OAuth2Provider::new(config_for(&server)).unwrap();
        let session = ProviderSession::new("s", "http://x");
        let err = provider.fetch_user(&session).await.unwrap_err();
        assert_eq!(err.operation, ProviderOperation::FetchUser);
    }
}
