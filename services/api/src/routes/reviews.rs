use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{error::ApiError, identity::Principal, models::review::NewReviewRequest, state::AppState};

/// Reviews of a session with their average rating
pub async fn session_reviews(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.summary(session_id).await?))
}

pub async fn add_review(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Json(request): Json<NewReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .reviews
        .add_review(&student, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
