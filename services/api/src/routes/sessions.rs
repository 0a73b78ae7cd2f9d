//! Study session routes

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    identity::Principal,
    models::{
        ConfirmationResponse, Outcome,
        study_session::{
            ApproveRequest, DeleteQuery, RejectRequest, SessionDraft,
            SessionFilter, SessionStatus,
        },
    },
    state::AppState,
};

/// Submit a new session for review
pub async fn create_session(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Json(draft): Json<SessionDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.create(&tutor, draft).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// All sessions, optionally filtered by status
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list(filter).await?))
}

/// Session details; signed-in callers also see their own booking state
pub async fn get_session(
    State(state): State<AppState>,
    viewer: Option<Extension<Principal>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.map(|Extension(principal)| principal);
    Ok(Json(state.sessions.details(id, viewer.as_ref()).await?))
}

pub async fn approved_sessions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list_approved().await?))
}

pub async fn my_sessions(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Query(filter): Query<SessionFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.list_for_tutor(&tutor, filter.status).await?))
}

pub async fn my_approved_sessions(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .sessions
        .list_for_tutor(&tutor, Some(SessionStatus::Approved))
        .await?;
    Ok(Json(sessions))
}

pub async fn approve_session(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(input): Json<ApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.approve(&admin, id, &input).await?))
}

pub async fn reject_session(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(input): Json<RejectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.reject(&admin, id, &input).await?))
}

pub async fn resubmit_session(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.resubmit(&tutor, id).await?))
}

pub async fn edit_session(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(draft): Json<SessionDraft>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.edit_as_admin(&admin, id, draft).await?))
}

pub async fn edit_own_session(
    State(state): State<AppState>,
    Extension(tutor): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(draft): Json<SessionDraft>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.sessions.edit_as_tutor(&tutor, id, draft).await?))
}

/// Delete an approved session; asks for confirmation unless `confirm=true`
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ApiError> {
    let response = match state.sessions.delete(&admin, id, query.confirm).await? {
        Outcome::Done(()) => Json(json!({"message": "Session deleted successfully"})).into_response(),
        Outcome::ConfirmationRequired { message } => Json(ConfirmationResponse {
            requires_confirmation: true,
            message,
        })
        .into_response(),
    };

    Ok(response)
}
