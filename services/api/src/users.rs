//! User profiles and role management

use common::Role;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    identity::{IdentityResolver, Principal},
    models::user::{CurrentUserResponse, ProfileUpdate, PublicTutor, User},
    repositories::UserStore,
};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    identity: IdentityResolver,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, identity: IdentityResolver) -> Self {
        Self { users, identity }
    }

    pub async fn current(&self, principal: &Principal) -> ApiResult<CurrentUserResponse> {
        let user = self
            .users
            .find_by_id(principal.id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("User"))?;

        Ok(CurrentUserResponse { exists: true, user })
    }

    /// Update the caller's own profile
    pub async fn update_profile(
        &self,
        principal: &Principal,
        email: &str,
        update: ProfileUpdate,
    ) -> ApiResult<User> {
        if !principal.email.eq_ignore_ascii_case(email.trim()) {
            return Err(ApiError::Forbidden);
        }
        if update
            .display_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ApiError::invalid("display_name", "name cannot be empty"));
        }

        let user = self
            .users
            .update_profile(&principal.email, &update)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("User"))?;

        self.identity.invalidate(&user.email).await;
        Ok(user)
    }

    pub async fn search(&self, term: Option<&str>) -> ApiResult<Vec<User>> {
        self.users.search(term).await.map_err(ApiError::transient)
    }

    /// Tutor directory without private contact details
    pub async fn tutors(&self) -> ApiResult<Vec<PublicTutor>> {
        let tutors = self
            .users
            .list_by_role(Role::Tutor)
            .await
            .map_err(ApiError::transient)?;
        Ok(tutors.into_iter().map(PublicTutor::from).collect())
    }

    /// Change a user's role; takes effect at the user's next request
    pub async fn update_role(&self, admin: &Principal, id: Uuid, role: Role) -> ApiResult<User> {
        if !admin.is(Role::Admin) {
            return Err(ApiError::Forbidden);
        }
        if admin.id == id && role != Role::Admin {
            return Err(ApiError::invalid("role", "admins cannot demote themselves"));
        }

        let user = self
            .users
            .update_role(id, role)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("User"))?;

        self.identity.invalidate(&user.email).await;
        info!("{} changed role of {} to {}", admin.email, user.email, role);
        Ok(user)
    }
}
