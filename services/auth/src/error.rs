//! Error type returned by the authentication handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Too many login attempts, try again later")]
    TooManyRequests,

    #[error("Google sign-in is not configured")]
    ProviderDisabled,

    #[error("Internal server error")]
    InternalServerError,
}

impl AuthError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Log an infrastructure failure and hide it from the client
    pub fn internal(err: anyhow::Error) -> Self {
        error!("Authentication backend failure: {:#}", err);
        AuthError::InternalServerError
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::ProviderDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::Validation { .. } => "validation_error",
            AuthError::EmailTaken => "email_taken",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unauthorized => "unauthenticated",
            AuthError::TooManyRequests => "rate_limited",
            AuthError::ProviderDisabled => "provider_disabled",
            AuthError::InternalServerError => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AuthError::Validation { field, message } = &self {
            body["fields"] = json!([{ "field": field, "message": message }]);
        }

        (self.status(), Json(body)).into_response()
    }
}
