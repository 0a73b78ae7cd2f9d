//! User repository for database operations

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::Role;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, email, password_hash, provider, display_name, photo_url, role, \
                            created_at, updated_at, last_login";

/// Hash a password with Argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?
        .to_string())
}

/// Verify a user's password; accounts without a password never match
pub fn verify_password(user: &User, password: &str) -> bool {
    let Some(hash) = user.password_hash.as_deref() else {
        return false;
    };
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        provider: row.get("provider"),
        display_name: row.get("display_name"),
        photo_url: row.get("photo_url"),
        role: role.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_login: row.get("last_login"),
    })
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user; `None` when the email is already registered
    pub async fn create(&self, new_user: &NewUser) -> Result<Option<User>> {
        info!("Creating new user: {}", new_user.email);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (email, password_hash, provider, display_name, photo_url, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_user.email.trim().to_lowercase())
        .bind(&new_user.password_hash)
        .bind(&new_user.provider)
        .bind(&new_user.display_name)
        .bind(&new_user.photo_url)
        .bind(new_user.role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Find a user by email, ignoring case
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Existing user for a social sign-in, or a new student account
    pub async fn find_or_create_oauth(
        &self,
        provider: &str,
        email: &str,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<User> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }

        let new_user = NewUser {
            email: email.to_string(),
            password_hash: None,
            provider: provider.to_string(),
            display_name: name,
            photo_url,
            role: Role::Student,
        };
        if let Some(user) = self.create(&new_user).await? {
            return Ok(user);
        }

        // Lost a race with a concurrent sign-in for the same email
        self.find_by_email(email)
            .await?
            .ok_or_else(|| anyhow!("User {} vanished after insert conflict", email))
    }
}
