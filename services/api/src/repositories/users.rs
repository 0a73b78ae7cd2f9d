//! User directory backed by Postgres

use anyhow::Result;
use async_trait::async_trait;
use common::Role;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::UserStore;
use crate::models::user::{ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, display_name, photo_url, role, phone, address, bio, \
                            created_at, updated_at, last_login";

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        photo_url: row.get("photo_url"),
        role: role.parse()?,
        phone: row.get("phone"),
        address: row.get("address"),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_login: row.get("last_login"),
    })
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn search(&self, term: Option<&str>) -> Result<Vec<User>> {
        let pattern = format!("%{}%", term.unwrap_or("").trim());

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE display_name ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC
            "#,
            USER_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY display_name",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_profile(&self, email: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                photo_url = COALESCE($3, photo_url),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                bio = COALESCE($6, bio),
                updated_at = NOW()
            WHERE lower(email) = lower($1)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email)
        .bind(&update.display_name)
        .bind(&update.photo_url)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.bio)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}
