//! Booking and payment routes

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::ApiError,
    identity::Principal,
    models::booking::{BookedSessionsQuery, BookingRequest, PaymentConfirmation, PaymentIntentRequest},
    state::AppState,
};

/// Book a free session
pub async fn book_session(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state
        .bookings
        .book_free(&student, request.session_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Book a paid session once the payment intent succeeded
pub async fn book_paid_session(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state
        .bookings
        .book_paid(&student, &confirmation, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Json(request): Json<PaymentIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = state
        .bookings
        .create_payment_intent(&student, request.session_id, Utc::now())
        .await?;
    Ok(Json(intent))
}

pub async fn booked_sessions(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Query(query): Query<BookedSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let booked = state
        .bookings
        .booked_sessions(&student, &query.student_email, Utc::now())
        .await?;
    Ok(Json(booked))
}
