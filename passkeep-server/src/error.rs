//! Server error types.

use crate::auth::AuthError;
use crate::storage::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server error types mapped to HTTP status codes.
#[derive(Debug)]
pub enum ServerError {
    Unauthenticated(String),
    InvalidArgument(String),
    LoginBusy,
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated(e) => write!(f, "Unauthenticated: {}", e),
            Self::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            Self::LoginBusy => write!(f, "login is busy"),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthenticated(e) => (StatusCode::UNAUTHORIZED, e.clone()),
            Self::InvalidArgument(e) => (StatusCode::BAD_REQUEST, e.clone()),
            Self::LoginBusy => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Self::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) => {
                Self::Unauthenticated(e.to_string())
            }
            AuthError::LoginBusy => Self::LoginBusy,
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}
