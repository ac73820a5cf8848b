//! Command-line interface
//!
//! Every flag can also be set through its `TOKENWARD_*` environment variable.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokenward_auth::config::{DEFAULT_ACCESS_TTL, DEFAULT_CODE_TTL, DEFAULT_REFRESH_TTL};
use tokenward_auth::{
    Algorithm, AuthConfig, ClaimsProvider, HttpClaimsProvider, HttpProfileSyncer, NoClaims,
    NoopProfileSyncer, ProfileSyncPolicy, ProfileSyncer, SessionPolicy,
};
use tracing_subscriber::EnvFilter;

use crate::error::{ServerError, ServerResult};

/// tokenward - OAuth sign-in and rotating refresh tokens
#[derive(Parser, Debug)]
#[command(
    name = "tokenward",
    version,
    about = "OAuth sign-in service issuing signed access tokens and rotating refresh tokens",
    author
)]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "TOKENWARD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TOKENWARD_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Public base URL, used to build provider callback URLs
    #[arg(long, env = "TOKENWARD_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// HMAC key for access tokens
    #[arg(long, env = "TOKENWARD_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Access token signing algorithm
    #[arg(
        long,
        env = "TOKENWARD_ALGORITHM",
        default_value = "HS256",
        value_parser = parse_algorithm
    )]
    pub algorithm: Algorithm,

    /// Access token lifetime in seconds
    #[arg(long, env = "TOKENWARD_ACCESS_TTL", default_value_t = DEFAULT_ACCESS_TTL)]
    pub access_ttl: i64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "TOKENWARD_REFRESH_TTL", default_value_t = DEFAULT_REFRESH_TTL)]
    pub refresh_ttl: i64,

    /// Lifetime of an in-flight login in seconds
    #[arg(long, env = "TOKENWARD_CODE_TTL", default_value_t = DEFAULT_CODE_TTL)]
    pub code_ttl: i64,

    /// Whether a session code is consumed by its callback
    #[arg(long, env = "TOKENWARD_SESSION_POLICY", value_enum, default_value = "single-use")]
    pub session_policy: SessionPolicyArg,

    /// How a profile sync failure affects sign-in
    #[arg(long, env = "TOKENWARD_PROFILE_SYNC_POLICY", value_enum, default_value = "required")]
    pub profile_sync_policy: ProfileSyncPolicyArg,

    /// Claims service base URL; the user id is appended
    #[arg(long, env = "TOKENWARD_CLAIMS_ENDPOINT")]
    pub claims_endpoint: Option<String>,

    /// JSONPath expression selecting the claims object in the claims response
    #[arg(long, env = "TOKENWARD_CLAIMS_JSON_PATH", default_value = "$")]
    pub claims_json_path: String,

    /// Header carrying the claims service credential
    #[arg(long, env = "TOKENWARD_CLAIMS_AUTH_HEADER", default_value = "authorization")]
    pub claims_auth_header: String,

    /// Claims service credential
    #[arg(
        long,
        env = "TOKENWARD_CLAIMS_AUTH_TOKEN",
        default_value = "",
        hide_env_values = true
    )]
    pub claims_auth_token: String,

    /// Profile service URL receiving provider profiles
    #[arg(long, env = "TOKENWARD_PROFILE_ENDPOINT")]
    pub profile_endpoint: Option<String>,

    /// Header carrying the profile service credential
    #[arg(long, env = "TOKENWARD_PROFILE_AUTH_HEADER", default_value = "authorization")]
    pub profile_auth_header: String,

    /// Profile service credential
    #[arg(
        long,
        env = "TOKENWARD_PROFILE_AUTH_TOKEN",
        default_value = "",
        hide_env_values = true
    )]
    pub profile_auth_token: String,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, env = "TOKENWARD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "TOKENWARD_LOG_JSON")]
    pub log_json: bool,
}

/// Session consumption policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionPolicyArg {
    /// Delete the session when its callback arrives
    SingleUse,
    /// Keep the session until it expires
    Reusable,
}

impl From<SessionPolicyArg> for SessionPolicy {
    fn from(arg: SessionPolicyArg) -> Self {
        match arg {
            SessionPolicyArg::SingleUse => Self::SingleUse,
            SessionPolicyArg::Reusable => Self::Reusable,
        }
    }
}

/// Profile sync failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileSyncPolicyArg {
    /// Fail sign-in
    Required,
    /// Log and continue
    BestEffort,
}

impl From<ProfileSyncPolicyArg> for ProfileSyncPolicy {
    fn from(arg: ProfileSyncPolicyArg) -> Self {
        match arg {
            ProfileSyncPolicyArg::Required => Self::Required,
            ProfileSyncPolicyArg::BestEffort => Self::BestEffort,
        }
    }
}

fn parse_algorithm(raw: &str) -> Result<Algorithm, String> {
    raw.parse::<Algorithm>()
        .map_err(|_| format!("unknown algorithm '{raw}'"))
}

impl Cli {
    /// Socket address to bind
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Configuration`] if host and port do not form an address.
    pub fn listen_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Configuration(format!("invalid listen address: {e}")))
    }

    /// Engine configuration, validated
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Auth`] if the configuration is rejected.
    pub fn auth_config(&self) -> ServerResult<AuthConfig> {
        let config = AuthConfig::new(self.secret_key.clone())
            .with_algorithm(self.algorithm)
            .with_access_ttl(self.access_ttl)
            .with_refresh_ttl(self.refresh_ttl)
            .with_code_ttl(self.code_ttl)
            .with_session_policy(self.session_policy.into())
            .with_profile_sync_policy(self.profile_sync_policy.into());
        config.validate()?;
        Ok(config)
    }

    /// Claims source: the HTTP claims service when configured, otherwise none
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Auth`] if the claims JSONPath expression is invalid.
    pub fn claims_provider(&self) -> ServerResult<Arc<dyn ClaimsProvider>> {
        let provider: Arc<dyn ClaimsProvider> =
            match self.claims_endpoint.as_deref().filter(|e| !e.is_empty()) {
                Some(endpoint) => Arc::new(HttpClaimsProvider::new(
                    endpoint,
                    self.claims_json_path.as_str(),
                    self.claims_auth_header.as_str(),
                    self.claims_auth_token.as_str(),
                )?),
                None => Arc::new(NoClaims),
            };
        Ok(provider)
    }

    /// Profile sink: the HTTP profile service when configured, otherwise a no-op
    #[must_use]
    pub fn profile_syncer(&self) -> Arc<dyn ProfileSyncer> {
        match self.profile_endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => Arc::new(HttpProfileSyncer::new(
                endpoint,
                self.profile_auth_header.as_str(),
                self.profile_auth_token.as_str(),
            )),
            None => Arc::new(NoopProfileSyncer),
        }
    }

    /// Install the global tracing subscriber
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.as_str()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false);

        if self.log_json {
            builder.json().init();
        } else {
            builder.init();
        }
    }
}
