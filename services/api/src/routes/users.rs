//! User profile and administration routes

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    identity::Principal,
    models::user::{ProfileUpdate, RoleUpdate, UserSearchQuery},
    state::AppState,
};

/// The caller's own user record
pub async fn current_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.current(&principal).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(email): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.update_profile(&principal, &email, update).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.search(query.search.as_deref()).await?))
}

pub async fn tutors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.tutors().await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(update): Json<RoleUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.users.update_role(&admin, id, update.role).await?))
}
