//! Mapping of domain errors to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mixlink_auth::AuthError;
use serde_json::json;
use tracing::error;

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    NotFound,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::PairingCodeInvalid => StatusCode::BAD_REQUEST,
                AuthError::PairingCodeExpired => StatusCode::GONE,
                AuthError::PairingRateLimited => StatusCode::TOO_MANY_REQUESTS,
                AuthError::SessionLimitReached => StatusCode::CONFLICT,
                AuthError::Unauthorized | AuthError::SessionInvalid | AuthError::SessionExpired => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::Auth(AuthError::Storage(e)) => {
                error!("Session storage failure: {}", e);
                ("internal_error", "Internal error".to_string())
            }
            ApiError::Auth(e) => (e.code(), e.to_string()),
            ApiError::NotFound => ("not_found", "Not found".to_string()),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
