//! Session management using Redis
//!
//! Each user has one Redis entry holding the refresh tokens of their active
//! sessions, so logging out of every device is a single delete.

use anyhow::Result;
use common::cache::RedisPool;
use tracing::info;
use uuid::Uuid;

/// Oldest sessions are dropped past this many devices
const MAX_SESSIONS_PER_USER: usize = 10;

fn session_key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}

/// Refresh tokens of a user's active sessions, oldest first
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionSet(Vec<String>);

impl SessionSet {
    pub fn add(&mut self, refresh_token: &str) {
        self.0.push(refresh_token.to_string());
        if self.0.len() > MAX_SESSIONS_PER_USER {
            let excess = self.0.len() - MAX_SESSIONS_PER_USER;
            self.0.drain(..excess);
        }
    }

    pub fn contains(&self, refresh_token: &str) -> bool {
        self.0.iter().any(|t| t == refresh_token)
    }

    /// Swap a rotated token in place; false when `old` is not a live session
    pub fn replace(&mut self, old: &str, new: &str) -> bool {
        match self.0.iter_mut().find(|t| t.as_str() == old) {
            Some(slot) => {
                *slot = new.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, refresh_token: &str) {
        self.0.retain(|t| t != refresh_token);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Session manager for handling user sessions in Redis
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
    ttl_seconds: u64,
}

impl SessionManager {
    /// Sessions live as long as the refresh tokens they hold
    pub fn new(redis_pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            redis_pool,
            ttl_seconds,
        }
    }

    async fn load(&self, user_id: Uuid) -> Result<SessionSet> {
        let tokens: Option<Vec<String>> = self.redis_pool.get_json(&session_key(user_id)).await?;
        Ok(SessionSet(tokens.unwrap_or_default()))
    }

    async fn store(&self, user_id: Uuid, sessions: &SessionSet) -> Result<()> {
        if sessions.is_empty() {
            return self.redis_pool.delete(&session_key(user_id)).await;
        }
        self.redis_pool
            .set_json(&session_key(user_id), &sessions.0, Some(self.ttl_seconds))
            .await
    }

    /// Create a new session for a user
    pub async fn create_session(&self, user_id: Uuid, refresh_token: &str) -> Result<()> {
        info!("Creating session for user: {}", user_id);

        let mut sessions = self.load(user_id).await?;
        sessions.add(refresh_token);
        self.store(user_id, &sessions).await
    }

    /// Check if a session exists and is valid
    pub async fn is_session_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool> {
        Ok(self.load(user_id).await?.contains(refresh_token))
    }

    /// Replace a rotated refresh token
    pub async fn rotate_session(&self, user_id: Uuid, old: &str, new: &str) -> Result<bool> {
        let mut sessions = self.load(user_id).await?;
        if !sessions.replace(old, new) {
            return Ok(false);
        }
        self.store(user_id, &sessions).await?;
        Ok(true)
    }

    /// Delete a session for a user
    pub async fn delete_session(&self, user_id: Uuid, refresh_token: &str) -> Result<()> {
        info!("Deleting session for user: {}", user_id);

        let mut sessions = self.load(user_id).await?;
        sessions.remove(refresh_token);
        self.store(user_id, &sessions).await
    }

    /// Delete all sessions for a user (logout from all devices)
    pub async fn delete_all_sessions(&self, user_id: Uuid) -> Result<()> {
        info!("Deleting all sessions for user: {}", user_id);
        self.redis_pool.delete(&session_key(user_id)).await
    }
}
