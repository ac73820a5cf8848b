//! HTTP routes
//!
//! | Method | Path                   | Result                                   |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/health`              | status and configured providers          |
//! | GET    | `/{provider}`          | 307 redirect to the provider             |
//! | GET    | `/{provider}/callback` | token pair for the signed-in user        |
//! | POST   | `/refresh`             | rotated token pair (`refresh_token` form)|

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokenward_auth::{AuthService, CallbackParams, IssuedToken};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;

/// Shared handler state
pub type AppState = Arc<AuthService>;

/// Build the application router
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/refresh", post(refresh))
        .route("/{provider}", get(start_oauth))
        .route("/{provider}/callback", get(callback))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Health check endpoint
async fn health_check(State(service): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "providers": service.providers().names(),
    }))
}

async fn start_oauth(
    State(service): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect, ApiError> {
    let url = service.start_oauth(&provider).await?;
    debug!(provider = %provider, "redirecting to provider");
    Ok(Redirect::temporary(&url))
}

async fn callback(
    State(service): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<IssuedToken>, ApiError> {
    let code = query
        .get("state")
        .filter(|s| !s.is_empty())
        .cloned()
        .ok_or(ApiError::MissingParameter("state"))?;

    let token = service
        .sign_in(&provider, &code, &CallbackParams::from(query))
        .await?;
    info!(provider = %provider, "sign-in completed");
    Ok(Json(token))
}

async fn refresh(
    State(service): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<IssuedToken>, ApiError> {
    let id = form
        .get("refresh_token")
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingParameter("refresh_token"))?;

    Ok(Json(service.refresh(id).await?))
}
