//! API service routes
//!
//! Routes are grouped by the capability they require. Every group except the
//! public one resolves the caller first and then applies the access policy.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{auth_middleware, optional_auth_middleware, require_capability},
    policy::{self, AccessResponse, Capability, RoleState},
    state::AppState,
};

mod bookings;
mod materials;
mod notes;
mod reviews;
mod sessions;
mod stats;
mod users;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/access", get(access))
        .route("/api/study-sessions/approved", get(sessions::approved_sessions))
        .route("/api/users/tutors", get(users::tutors))
        .route("/api/reviews/:sessionId", get(reviews::session_reviews));

    // Public, but resolves the caller when a token is sent
    let viewer_routes = Router::new()
        .route("/api/sessions/:id", get(sessions::get_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let authenticated_routes = Router::new()
        .route("/api/user", get(users::current_user))
        .route("/api/user/update/:email", patch(users::update_profile));

    let student_routes = Router::new()
        .route("/api/booking", post(bookings::book_session))
        .route("/api/paid-sessions/booking", post(bookings::book_paid_session))
        .route(
            "/api/payments/create-payment-intent",
            post(bookings::create_payment_intent),
        )
        .route("/api/booked-sessions", get(bookings::booked_sessions))
        .route("/api/reviews", post(reviews::add_review))
        .route(
            "/api/student-notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route(
            "/api/student-notes/:id",
            patch(notes::update_note).delete(notes::delete_note),
        )
        .route("/api/materials", get(materials::session_materials))
        .route("/api/student-stats", get(stats::student_stats));

    let tutor_routes = Router::new()
        .route("/api/create-session", post(sessions::create_session))
        .route("/api/my-sessions", get(sessions::my_sessions))
        .route(
            "/api/study-sessions/approved/tutor",
            get(sessions::my_approved_sessions),
        )
        .route("/api/sessions/:id/tutor", patch(sessions::edit_own_session))
        .route("/api/sessions/resubmit/:id", patch(sessions::resubmit_session))
        .route(
            "/api/tutor-materials",
            get(materials::tutor_materials).post(materials::create_material),
        )
        .route(
            "/api/tutor-materials/:id",
            patch(materials::update_material).delete(materials::delete_material),
        )
        .route("/api/tutor-stats", get(stats::tutor_stats));

    let admin_routes = Router::new()
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/:id/approve", patch(sessions::approve_session))
        .route("/api/sessions/:id/reject", patch(sessions::reject_session))
        .route(
            "/api/sessions/:id",
            patch(sessions::edit_session).delete(sessions::delete_session),
        )
        .route("/api/users", get(users::list_users))
        .route("/api/users/:id/role", patch(users::update_role))
        .route("/api/materials/all", get(materials::all_materials))
        .route(
            "/api/materials/:id",
            axum::routing::delete(materials::delete_material),
        )
        .route("/api/overview-stats", get(stats::overview_stats));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(guarded(authenticated_routes, Capability::AuthenticatedArea, &state))
        .merge(guarded(student_routes, Capability::StudentArea, &state))
        .merge(guarded(tutor_routes, Capability::TutorArea, &state))
        .merge(guarded(admin_routes, Capability::AdminArea, &state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve the caller, then check the capability
fn guarded(
    routes: Router<AppState>,
    capability: Capability,
    state: &AppState,
) -> Router<AppState> {
    routes
        .route_layer(middleware::from_fn_with_state(capability, require_capability))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let redis = match &state.redis_pool {
        Some(pool) => Some(pool.health_check().await.unwrap_or(false)),
        None => None,
    };

    let healthy = database && redis.unwrap_or(true);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database,
            "redis": redis,
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub path: String,
}

/// Access decision for a client route, as the caller's role currently stands
///
/// A caller whose identity cannot be resolved right now gets `pending`
/// instead of a denial.
pub async fn access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let role_state = match headers.typed_get::<Authorization<Bearer>>() {
        None => RoleState::Anonymous,
        Some(bearer) => match state.identity.resolve(bearer.token()).await {
            Ok(principal) => RoleState::Resolved(principal.role),
            Err(e) if e.is_transient() => RoleState::Loading,
            Err(_) => RoleState::Anonymous,
        },
    };

    Json(policy::decide_path(&query.path, role_state))
}
