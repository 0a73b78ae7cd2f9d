//! Authentication and access-policy middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use crate::{
    error::ApiError,
    identity::Principal,
    policy::{self, Capability},
    state::AppState,
};

/// Resolve the bearer token and attach the [`Principal`] to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthenticated { transient: false })?;

    let principal = state.identity.resolve(bearer.token()).await?;
    debug!("Request by {} ({})", principal.email, principal.role);

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Attach the [`Principal`] when a bearer token is present
///
/// Anonymous requests pass through; a token that does not resolve is still
/// rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(bearer) = req.headers().typed_get::<Authorization<Bearer>>() {
        let principal = state.identity.resolve(bearer.token()).await?;
        req.extensions_mut().insert(principal);
    }
    Ok(next.run(req).await)
}

/// Reject callers whose role does not grant `capability`
///
/// Must run after [`auth_middleware`].
pub async fn require_capability(
    State(capability): State<Capability>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or(ApiError::Unauthenticated { transient: false })?;

    policy::ensure(principal, capability)?;
    Ok(next.run(req).await)
}
