//! Identity resolution
//!
//! Maps a bearer token to the application-level [`Principal`]. The token only
//! proves who the caller is; the role always comes from the user directory
//! (or its short-lived Redis copy), so an admin's role change is seen at the
//! next request once the cache entry is invalidated.

use common::{
    Role,
    cache::{RedisPool, identity_key},
    token::TokenVerifier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::ApiError, models::user::User, repositories::UserStore};

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Principal {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user
                .display_name
                .clone()
                .unwrap_or_else(|| user.email.clone()),
            role: user.role,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid or expired token")]
    InvalidToken,

    /// Valid token but no application record; the caller must register first
    #[error("user is not registered")]
    NotRegistered,

    /// Directory lookup failed; retrying may succeed
    #[error("user directory unavailable")]
    DirectoryUnavailable,
}

impl ResolveError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::DirectoryUnavailable)
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        ApiError::Unauthenticated {
            transient: err.is_transient(),
        }
    }
}

/// Single call path for turning tokens into principals
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: TokenVerifier,
    directory: Arc<dyn UserStore>,
    cache: Option<RedisPool>,
    cache_ttl: u64,
}

impl IdentityResolver {
    pub fn new(
        verifier: TokenVerifier,
        directory: Arc<dyn UserStore>,
        cache: Option<RedisPool>,
        cache_ttl: u64,
    ) -> Self {
        Self {
            verifier,
            directory,
            cache,
            cache_ttl,
        }
    }

    /// Resolve a bearer token to the caller's principal
    pub async fn resolve(&self, token: &str) -> Result<Principal, ResolveError> {
        let claims = self.verifier.verify_access(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ResolveError::InvalidToken
        })?;

        if let Some(principal) = self.cached(&claims.email).await {
            if principal.id == claims.sub {
                return Ok(principal);
            }
        }

        let user = self
            .directory
            .find_by_email(&claims.email)
            .await
            .map_err(|e| {
                warn!("User directory lookup failed for {}: {:#}", claims.email, e);
                ResolveError::DirectoryUnavailable
            })?
            .filter(|user| user.id == claims.sub)
            .ok_or(ResolveError::NotRegistered)?;

        let principal = Principal::from(&user);
        self.store(&principal).await;
        Ok(principal)
    }

    /// Drop the cached principal for `email`
    ///
    /// Called on login, logout, profile update and role change.
    pub async fn invalidate(&self, email: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&identity_key(email)).await {
                warn!("Failed to invalidate identity cache for {}: {:#}", email, e);
            }
        }
    }

    async fn cached(&self, email: &str) -> Option<Principal> {
        let cache = self.cache.as_ref()?;
        match cache.get_json::<Principal>(&identity_key(email)).await {
            Ok(principal) => principal,
            Err(e) => {
                warn!("Identity cache read failed, using directory: {:#}", e);
                None
            }
        }
    }

    async fn store(&self, principal: &Principal) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache
            .set_json(&identity_key(&principal.email), principal, Some(self.cache_ttl))
            .await
        {
            warn!("Identity cache write failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repositories::memory::{MemoryStore, user},
        testing::{refresh_token_for, resolver, token_for},
    };
    use common::cache::RedisConfig;

    #[tokio::test]
    async fn test_resolves_role_from_directory() {
        let store = Arc::new(MemoryStore::new());
        let tutor = user("tutor@example.com", Role::Tutor);
        store.add_user(tutor.clone());

        let principal = resolver(store).resolve(&token_for(&tutor)).await.unwrap();

        assert_eq!(principal.id, tutor.id);
        assert_eq!(principal.role, Role::Tutor);
        assert_eq!(principal.name, "tutor");
    }

    #[tokio::test]
    async fn test_garbage_and_refresh_tokens_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let student = user("student@example.com", Role::Student);
        store.add_user(student.clone());
        let resolver = resolver(store);

        assert_eq!(
            resolver.resolve("not-a-jwt").await,
            Err(ResolveError::InvalidToken)
        );
        assert_eq!(
            resolver.resolve(&refresh_token_for(&student)).await,
            Err(ResolveError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_unregistered_user_is_not_transient() {
        let store = Arc::new(MemoryStore::new());
        let stranger = user("stranger@example.com", Role::Student);

        let err = resolver(store)
            .resolve(&token_for(&stranger))
            .await
            .unwrap_err();

        assert_eq!(err, ResolveError::NotRegistered);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_directory_outage_is_transient() {
        let store = Arc::new(MemoryStore::new());
        let student = user("student@example.com", Role::Student);
        store.add_user(student.clone());
        store.set_unavailable(true);

        let err = resolver(store)
            .resolve(&token_for(&student))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            ApiError::from(err),
            ApiError::Unauthenticated { transient: true }
        ));
    }

    #[tokio::test]
    async fn test_role_change_applies_on_next_request() {
        let store = Arc::new(MemoryStore::new());
        let member = user("member@example.com", Role::Student);
        store.add_user(member.clone());
        let resolver = resolver(store.clone());
        let token = token_for(&member);

        assert_eq!(resolver.resolve(&token).await.unwrap().role, Role::Student);

        store.update_role(member.id, Role::Tutor).await.unwrap();
        resolver.invalidate(&member.email).await;

        assert_eq!(resolver.resolve(&token).await.unwrap().role, Role::Tutor);
    }

    #[tokio::test]
    async fn test_unreachable_cache_falls_back_to_directory() {
        let store = Arc::new(MemoryStore::new());
        let admin = user("admin@example.com", Role::Admin);
        store.add_user(admin.clone());

        let cache = RedisPool::new(&RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 1,
        })
        .unwrap();
        let resolver = IdentityResolver::new(
            crate::testing::verifier(),
            store,
            Some(cache),
            60,
        );

        let principal = resolver.resolve(&token_for(&admin)).await.unwrap();
        assert_eq!(principal.role, Role::Admin);
        resolver.invalidate(&admin.email).await;
    }
}
