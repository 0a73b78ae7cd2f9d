//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::study_session::SessionStatus;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad input shape or range
    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    /// No usable principal; `transient` marks a directory outage
    #[error("Unauthenticated")]
    Unauthenticated { transient: bool },

    /// Role or ownership mismatch
    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Wrong status or outside the registration window
    #[error("Session is not bookable: {0}")]
    SessionNotBookable(String),

    #[error("Session already booked by this student")]
    DuplicateBooking,

    #[error("Session is full")]
    CapacityExceeded,

    /// Lifecycle action not allowed from the current status
    #[error("Cannot {action} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    #[error("Payment not confirmed: {0}")]
    PaymentNotConfirmed(String),

    /// Store or collaborator unavailable; nothing was changed
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError::new(field, message)])
    }

    /// Map an infrastructure failure to a retryable error, logging the cause
    pub fn transient(err: anyhow::Error) -> Self {
        error!("Store operation failed: {:#}", err);
        ApiError::Transient("storage unavailable".to_string())
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthenticated { transient: false } => "unauthenticated",
            ApiError::Unauthenticated { transient: true } => "identity_unavailable",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::SessionNotBookable(_) => "session_not_bookable",
            ApiError::DuplicateBooking => "duplicate_booking",
            ApiError::CapacityExceeded => "capacity_exceeded",
            ApiError::InvalidTransition { .. } => "invalid_transition",
            ApiError::PaymentNotConfirmed(_) => "payment_not_confirmed",
            ApiError::Transient(_) => "transient",
            ApiError::InternalServerError => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthenticated { transient: false } => StatusCode::UNAUTHORIZED,
            ApiError::Unauthenticated { transient: true } | ApiError::Transient(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SessionNotBookable(_)
            | ApiError::DuplicateBooking
            | ApiError::CapacityExceeded
            | ApiError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ApiError::PaymentNotConfirmed(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Transient(_) | ApiError::Unauthenticated { transient: true }
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let ApiError::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
