//! Dashboard statistics routes

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{error::ApiError, identity::Principal, state::AppState};

pub async fn overview_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.overview().await?))
}

pub async fn tutor_stats(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.tutor(&tutor).await?))
}

pub async fn student_stats(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.student(&student, Utc::now()).await?))
}
