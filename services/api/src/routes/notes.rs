use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    identity::Principal,
    models::note::{NoteQuery, NoteRequest},
    state::AppState,
};

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(owner): Extension<Principal>,
    Query(query): Query<NoteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.notes.list(&owner, &query.email).await?))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(owner): Extension<Principal>,
    Json(request): Json<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.notes.create(&owner, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(owner): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.notes.update(&owner, id, request).await?))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(owner): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.notes.delete(&owner, id).await?;
    Ok(Json(json!({"message": "Note deleted successfully"})))
}
