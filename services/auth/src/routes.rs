//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::{cache::identity_key, token::Claims};
use oauth2::PkceCodeVerifier;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    middleware::auth_middleware,
    models::{
        GoogleCallbackQuery, LoginRequest, NewUser, RefreshTokenRequest, RegisterRequest,
        RegisterResponse, TokenResponse, User,
    },
    oauth::{OAUTH_STATE_TTL, OAuthSession, oauth_state_key},
    repositories::{hash_password, verify_password},
    validation::{validate_email, validate_password},
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/logout-all", post(logout_all))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/registerUser", post(register_user))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/google/authorize", get(google_authorize))
        .route("/auth/google/callback", get(google_callback))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let redis = state.redis_pool.health_check().await.unwrap_or(false);

    let status = if database && redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database && redis { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database,
            "redis": redis,
        })),
    )
}

/// Drop the api's cached identity so role and profile are re-read
async fn forget_identity(state: &AppState, email: &str) {
    if let Err(e) = state.redis_pool.delete(&identity_key(email)).await {
        warn!("Failed to invalidate cached identity of {}: {}", email, e);
    }
}

/// Sign a token pair and open a session for it
async fn issue_tokens(state: &AppState, user: &User) -> Result<TokenResponse, AuthError> {
    let access_token = state
        .jwt_service
        .generate_access_token(user)
        .map_err(AuthError::internal)?;
    let refresh_token = state
        .jwt_service
        .generate_refresh_token(user)
        .map_err(AuthError::internal)?;

    state
        .sessions
        .create_session(user.id, &refresh_token)
        .await
        .map_err(AuthError::internal)?;
    forget_identity(state, &user.email).await;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
    })
}

/// Register an email/password account
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = payload.email.trim().to_lowercase();
    validate_email(&email).map_err(|m| AuthError::invalid("email", m))?;
    validate_password(&payload.password).map_err(|m| AuthError::invalid("password", m))?;

    let role = payload.role.unwrap_or_default();
    if !role.is_self_assignable() {
        return Err(AuthError::invalid("role", "Role must be student or tutor"));
    }

    let new_user = NewUser {
        email,
        password_hash: Some(hash_password(&payload.password).map_err(AuthError::internal)?),
        provider: "local".to_string(),
        display_name: payload.name.filter(|n| !n.trim().is_empty()),
        photo_url: payload.photo_url,
        role,
    };

    let user = state
        .user_repository
        .create(&new_user)
        .await
        .map_err(AuthError::internal)?
        .ok_or(AuthError::EmailTaken)?;

    info!("Registered {} as {}", user.email, user.role);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            inserted_id: user.id,
        }),
    ))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = payload.email.trim().to_lowercase();
    info!("Login attempt for user: {}", email);

    if !state.rate_limiter.is_allowed(&email).await {
        return Err(AuthError::TooManyRequests);
    }

    let user = state
        .user_repository
        .find_by_email(&email)
        .await
        .map_err(AuthError::internal)?
        .filter(|user| verify_password(user, &payload.password))
        .ok_or(AuthError::InvalidCredentials)?;

    state.rate_limiter.reset(&email).await;
    state
        .user_repository
        .record_login(user.id)
        .await
        .map_err(AuthError::internal)?;

    Ok(Json(issue_tokens(&state, &user).await?))
}

/// Rotate a refresh token and issue a fresh access token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let claims = state
        .jwt_service
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    let blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, &payload.refresh_token)
        .await
        .map_err(AuthError::internal)?;
    if blacklisted {
        return Err(AuthError::Unauthorized);
    }

    let live = state
        .sessions
        .is_session_valid(claims.sub, &payload.refresh_token)
        .await
        .map_err(AuthError::internal)?;
    if !live {
        return Err(AuthError::Unauthorized);
    }

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await
        .map_err(AuthError::internal)?
        .ok_or(AuthError::Unauthorized)?;

    let access_token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(AuthError::internal)?;
    let new_refresh_token = state
        .jwt_service
        .generate_refresh_token(&user)
        .map_err(AuthError::internal)?;

    state
        .jwt_service
        .blacklist_token(&state.redis_pool, &payload.refresh_token, &claims)
        .await
        .map_err(AuthError::internal)?;
    state
        .sessions
        .rotate_session(user.id, &payload.refresh_token, &new_refresh_token)
        .await
        .map_err(AuthError::internal)?;

    Ok(Json(TokenResponse {
        access_token,
        refresh_token: new_refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
    }))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let claims = state
        .jwt_service
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    state
        .jwt_service
        .blacklist_token(&state.redis_pool, &payload.refresh_token, &claims)
        .await
        .map_err(AuthError::internal)?;
    state
        .sessions
        .delete_session(claims.sub, &payload.refresh_token)
        .await
        .map_err(AuthError::internal)?;
    forget_identity(&state, &claims.email).await;

    Ok(Json(json!({"message": "Logged out successfully"})))
}

/// End every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .sessions
        .delete_all_sessions(claims.sub)
        .await
        .map_err(AuthError::internal)?;
    forget_identity(&state, &claims.email).await;

    Ok(Json(json!({"message": "Logged out from all devices"})))
}

/// Start a Google sign-in
pub async fn google_authorize(State(state): State<AppState>) -> Result<impl IntoResponse, AuthError> {
    let client = state.oauth.as_ref().ok_or(AuthError::ProviderDisabled)?;
    let (authorize_url, csrf_token, pkce_verifier) = client.generate_auth_url();

    let pending = OAuthSession {
        pkce_verifier: pkce_verifier.secret().to_string(),
    };
    state
        .redis_pool
        .set_json(
            &oauth_state_key(csrf_token.secret()),
            &pending,
            Some(OAUTH_STATE_TTL),
        )
        .await
        .map_err(AuthError::internal)?;

    Ok(Json(json!({ "authorize_url": authorize_url })))
}

/// Finish a Google sign-in; unknown emails become student accounts
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let client = state.oauth.as_ref().ok_or(AuthError::ProviderDisabled)?;

    let key = oauth_state_key(&query.state);
    let pending: OAuthSession = state
        .redis_pool
        .get_json(&key)
        .await
        .map_err(AuthError::internal)?
        .ok_or(AuthError::Unauthorized)?;
    state
        .redis_pool
        .delete(&key)
        .await
        .map_err(AuthError::internal)?;

    let profile = client
        .fetch_profile(query.code, PkceCodeVerifier::new(pending.pkce_verifier))
        .await
        .map_err(|e| {
            warn!("Google sign-in failed: {}", e);
            AuthError::Unauthorized
        })?;
    if !profile.verified_email {
        return Err(AuthError::Unauthorized);
    }

    let user = state
        .user_repository
        .find_or_create_oauth("google", &profile.email, profile.name, profile.picture)
        .await
        .map_err(AuthError::internal)?;
    state
        .user_repository
        .record_login(user.id)
        .await
        .map_err(AuthError::internal)?;

    Ok(Json(issue_tokens(&state, &user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use common::Role;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::testing::app_state;

    async fn send(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = create_router(app_state());
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_register_rejects_admin_role() {
        let (status, body) = send(
            "POST",
            "/api/registerUser",
            None,
            Some(json!({
                "email": "ada@example.com",
                "password": "Sup3r$ecret",
                "role": "admin",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "role");
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let (status, body) = send(
            "POST",
            "/api/registerUser",
            None,
            Some(json!({"email": "ada@example.com", "password": "password"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "password");
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_tokens() {
        let state = app_state();
        let user = crate::testing::user("ada@example.com", Role::Student);
        let access = state.jwt_service.generate_access_token(&user).unwrap();

        let (status, body) = send(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_logout_all_requires_access_token() {
        let (status, _) = send("POST", "/auth/logout-all", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send("POST", "/auth/logout-all", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_google_disabled_without_client_id() {
        let (status, body) = send("GET", "/auth/google/authorize", None, None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "provider_disabled");
    }
}
