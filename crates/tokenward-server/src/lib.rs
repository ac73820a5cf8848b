//! # tokenward-server
//!
//! HTTP front end for [`tokenward_auth`]: provider redirects, callbacks and refresh
//! rotation over axum, configured from flags and `TOKENWARD_*` environment variables.

pub mod cli;
pub mod error;
pub mod providers;
pub mod routes;

use std::sync::Arc;

use tokenward_auth::AuthService;
use tracing::info;

pub use cli::Cli;
pub use error::{ApiError, ServerError, ServerResult};
pub use routes::router;

/// Build the engine from parsed flags and the process environment
///
/// # Errors
///
/// Returns [`ServerError`] if the configuration, a provider definition or the claims
/// JSONPath expression is invalid.
pub fn build_service(cli: &Cli) -> ServerResult<Arc<AuthService>> {
    let registry = providers::registry_from_env(&cli.base_url)?;
    if registry.is_empty() {
        tracing::warn!("no OAuth providers configured");
    }

    let service = AuthService::builder(cli.auth_config()?)
        .providers(registry)
        .claims_provider(cli.claims_provider()?)
        .profile_syncer(cli.profile_syncer())
        .build()?;

    info!(providers = ?service.providers().names(), "auth service ready");
    Ok(Arc::new(service))
}

/// Bind and serve until `shutdown` resolves
///
/// # Errors
///
/// Returns [`ServerError::Io`] if binding or serving fails.
pub async fn serve(
    cli: &Cli,
    service: Arc<AuthService>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    let addr = cli.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "tokenward listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("tokenward stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received, initiating shutdown");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
