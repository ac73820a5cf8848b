//! Error types for tokenward-server
//!
//! [`ApiError`] is what handlers return; it owns the mapping from engine errors to HTTP
//! status codes. [`ServerError`] covers startup failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tokenward_auth::AuthError;
use tracing::{error, warn};

/// Result type for server startup
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Startup and configuration failures
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// Invalid command-line or environment configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Engine construction failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Listener or serve failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler error, rendered as a JSON body with a matching status
#[derive(Error, Debug)]
pub enum ApiError {
    /// Engine failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Required request parameter absent
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::UnknownProvider(_)) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Provider(_)) => StatusCode::BAD_GATEWAY,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::Auth(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log
        let message = if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
            match status {
                StatusCode::BAD_GATEWAY => "upstream provider error".to_string(),
                _ => "internal error".to_string(),
            }
        } else {
            warn!(error = %self, code = self.code(), "request rejected");
            match &self {
                Self::Auth(AuthError::Unauthorized(reason)) => reason.message().to_string(),
                other => other.to_string(),
            }
        };

        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenward_auth::{ProviderError, ProviderOperation, Rejection, StoreError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::from(Rejection::ExpiredToken)).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::UnknownProvider("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MissingParameter("state").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::from(ProviderError::new(
                ProviderOperation::Authorize,
                "denied"
            )))
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(AuthError::Store(StoreError::Backend("down".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
