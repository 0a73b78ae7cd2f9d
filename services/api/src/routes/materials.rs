//! Study material routes

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
    models::{
        PageQuery,
        material::{MaterialQuery, MaterialUpdate, NewMaterialRequest},
    },
    state::AppState,
};

pub async fn create_material(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Json(request): Json<NewMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state.materials.create(&tutor, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn tutor_materials(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.materials.list_for_tutor(&tutor).await?))
}

pub async fn update_material(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(update): Json<MaterialUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.materials.update(&tutor, id, update).await?))
}

/// Shared by the tutor and admin routes; ownership is checked by the service
pub async fn delete_material(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.materials.delete(&actor, id).await?;
    Ok(Json(json!({"message": "Material deleted successfully"})))
}

/// Materials of a session the student booked
pub async fn session_materials(
    State(state): State<AppState>,
    Extension(student): Extension<Principal>,
    Query(query): Query<MaterialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let materials = state
        .materials
        .list_for_student(&student, query.session_id)
        .await?;
    Ok(Json(materials))
}

pub async fn all_materials(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.materials.list_all(&page).await?))
}
