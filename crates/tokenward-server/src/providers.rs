//! Provider discovery from the environment
//!
//! Well-known providers are enabled by `GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET`,
//! `GITHUB_*`, `MICROSOFT_*` and `GITLAB_*`. Any other provider is described by a
//! `<NAME>_OAUTH_` prefixed group:
//!
//! ```text
//! ACME_OAUTH_CLIENT_ID       ACME_OAUTH_CLIENT_SECRET
//! ACME_OAUTH_AUTH_URL        ACME_OAUTH_TOKEN_URL
//! ACME_OAUTH_USERINFO_URL    ACME_OAUTH_SCOPES (optional, space separated)
//! ```
//!
//! The registry name is the lower-cased `<NAME>`, and each provider's callback is
//! `{base_url}/{name}/callback`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokenward_auth::{OAuth2Provider, OAuth2ProviderConfig, ProviderPreset, ProviderRegistry};
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

const GENERIC_MARKER: &str = "_OAUTH_CLIENT_ID";

/// Build provider configurations from environment variables
///
/// Providers whose client id is empty are skipped. Providers with a client id but no
/// client secret, and generic providers missing an endpoint, are skipped with a warning.
#[must_use]
pub fn configs_from_vars(
    vars: &HashMap<String, String>,
    base_url: &str,
) -> Vec<OAuth2ProviderConfig> {
    let base_url = base_url.trim_end_matches('/');
    let callback = |name: &str| format!("{base_url}/{name}/callback");
    let get = |key: &str| vars.get(key).map(String::as_str).unwrap_or_default();
    let mut configs = Vec::new();

    for preset in ProviderPreset::all() {
        let prefix = preset.name().to_uppercase();
        let client_id = get(&format!("{prefix}_CLIENT_ID"));
        if client_id.is_empty() {
            info!(provider = preset.name(), "provider not configured, skipping");
            continue;
        }
        let client_secret = get(&format!("{prefix}_CLIENT_SECRET"));
        if client_secret.is_empty() {
            warn!(
                provider = preset.name(),
                reason = "missing client secret",
                "skipping provider"
            );
            continue;
        }
        configs.push(OAuth2ProviderConfig::preset(
            preset,
            client_id,
            client_secret,
            callback(preset.name()),
        ));
    }

    // Sorted so registration order is stable
    let generic: BTreeMap<String, &str> = vars
        .iter()
        .filter_map(|(key, value)| {
            key.strip_suffix(GENERIC_MARKER)
                .filter(|prefix| !prefix.is_empty())
                .map(|prefix| (prefix.to_string(), value.as_str()))
        })
        .collect();

    for (prefix, client_id) in generic {
        let name = prefix.to_lowercase();
        if client_id.is_empty() {
            info!(provider = %name, "provider not configured, skipping");
            continue;
        }

        let endpoint = |suffix: &str| get(&format!("{prefix}_OAUTH_{suffix}")).to_string();
        let client_secret = endpoint("CLIENT_SECRET");
        if client_secret.is_empty() {
            warn!(provider = %name, reason = "missing client secret", "skipping provider");
            continue;
        }
        let (auth_url, token_url, userinfo_url) =
            (endpoint("AUTH_URL"), endpoint("TOKEN_URL"), endpoint("USERINFO_URL"));
        if auth_url.is_empty() || token_url.is_empty() || userinfo_url.is_empty() {
            warn!(
                provider = %name,
                reason = "needs AUTH_URL, TOKEN_URL and USERINFO_URL",
                "skipping provider"
            );
            continue;
        }

        let mut config = OAuth2ProviderConfig::generic(
            name.as_str(),
            client_id,
            client_secret,
            auth_url,
            token_url,
            userinfo_url,
            callback(&name),
        );
        let scopes = endpoint("SCOPES");
        if !scopes.is_empty() {
            config = config.with_scopes(scopes.split_whitespace().map(str::to_string).collect());
        }
        configs.push(config);
    }

    configs
}

/// Build the provider registry from environment variables
///
/// # Errors
///
/// Returns [`ServerError::Auth`] if a configured provider has malformed endpoints.
pub fn registry_from_vars(
    vars: &HashMap<String, String>,
    base_url: &str,
) -> ServerResult<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for config in configs_from_vars(vars, base_url) {
        let name = config.name.clone();
        let provider = OAuth2Provider::new(config).map_err(ServerError::from)?;
        info!(provider = %name, "provider registered");
        registry.register(Arc::new(provider));
    }
    Ok(registry)
}

/// Build the provider registry from the process environment
///
/// # Errors
///
/// See [`registry_from_vars`].
pub fn registry_from_env(base_url: &str) -> ServerResult<ProviderRegistry> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    registry_from_vars(&vars, base_url)
}
