//! Access policy
//!
//! A pure function of (role, capability). The HTTP layer applies it to every
//! route group, and `GET /api/access` exposes the same decision to the client
//! so its route guards never disagree with the server.

use common::Role;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, identity::Principal};

/// Area of the application a route belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    StudentArea,
    TutorArea,
    AdminArea,
    AuthenticatedArea,
}

/// Whether `role` may enter the area guarded by `capability`
pub fn can_access(role: Role, capability: Capability) -> bool {
    match capability {
        Capability::StudentArea => role == Role::Student,
        Capability::TutorArea => role == Role::Tutor,
        Capability::AdminArea => role == Role::Admin,
        Capability::AuthenticatedArea => true,
    }
}

/// What is known about the caller's role at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    /// Resolution still in flight
    Loading,
    Anonymous,
    Resolved(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Allow,
    /// Wait for the role before deciding
    Pending,
    #[serde(rename = "login")]
    RedirectToLogin,
    Forbidden,
}

/// Decide access for a possibly unresolved caller
///
/// A loading role never produces a denial.
pub fn evaluate(state: RoleState, capability: Capability) -> AccessDecision {
    match state {
        RoleState::Loading => AccessDecision::Pending,
        RoleState::Anonymous => AccessDecision::RedirectToLogin,
        RoleState::Resolved(role) if can_access(role, capability) => AccessDecision::Allow,
        RoleState::Resolved(_) => AccessDecision::Forbidden,
    }
}

/// Guard for service operations
pub fn ensure(principal: &Principal, capability: Capability) -> Result<(), ApiError> {
    if can_access(principal.role, capability) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Capability guarding a client route, `None` for public pages
pub fn capability_for_path(path: &str) -> Option<Capability> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let path = path.trim_end_matches('/');

    const ROUTES: &[(&str, Capability)] = &[
        ("/dashboard/manage-users", Capability::AdminArea),
        ("/dashboard/all-sessions", Capability::AdminArea),
        ("/dashboard/manage-materials", Capability::AdminArea),
        ("/dashboard/create-session", Capability::TutorArea),
        ("/dashboard/my-sessions", Capability::TutorArea),
        ("/dashboard/upload-materials", Capability::TutorArea),
        ("/dashboard/view-materials", Capability::TutorArea),
        ("/dashboard/booked-sessions", Capability::StudentArea),
        ("/dashboard/create-note", Capability::StudentArea),
        ("/dashboard/all-notes", Capability::StudentArea),
        ("/dashboard/study-materials", Capability::StudentArea),
    ];

    let under = |prefix: &str| path == prefix || path.starts_with(&format!("{}/", prefix));

    if let Some((_, capability)) = ROUTES.iter().find(|(prefix, _)| under(prefix)) {
        return Some(*capability);
    }
    if under("/dashboard") || under("/profile") || under("/payment") {
        return Some(Capability::AuthenticatedArea);
    }
    None
}

/// Response of `GET /api/access`
#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    pub path: String,
    pub capability: Option<Capability>,
    pub decision: AccessDecision,
}

/// Decision for `path` given the caller's role state
pub fn decide_path(path: &str, state: RoleState) -> AccessResponse {
    let capability = capability_for_path(path);
    let decision = match capability {
        None => AccessDecision::Allow,
        Some(capability) => evaluate(state, capability),
    };

    AccessResponse {
        path: path.to_string(),
        capability,
        decision,
    }
}
