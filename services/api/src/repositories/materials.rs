//! Material repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::MaterialStore;
use crate::models::material::{Material, MaterialUpdate};

const MATERIAL_COLUMNS: &str = "id, session_id, session_title, tutor_id, tutor_email, title, \
     image_url, drive_link, created_at, updated_at";

/// Material repository for database operations
#[derive(Clone)]
pub struct MaterialRepository {
    pool: PgPool,
}

impl MaterialRepository {
    /// Create a new material repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn material_from_row(row: &PgRow) -> Material {
    Material {
        id: row.get("id"),
        session_id: row.get("session_id"),
        session_title: row.get("session_title"),
        tutor_id: row.get("tutor_id"),
        tutor_email: row.get("tutor_email"),
        title: row.get("title"),
        image_url: row.get("image_url"),
        drive_link: row.get("drive_link"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl MaterialStore for MaterialRepository {
    async fn insert(&self, material: &Material) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO materials (
                id, session_id, session_title, tutor_id, tutor_email, title,
                image_url, drive_link, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(material.id)
        .bind(material.session_id)
        .bind(&material.session_title)
        .bind(material.tutor_id)
        .bind(&material.tutor_email)
        .bind(&material.title)
        .bind(&material.image_url)
        .bind(&material.drive_link)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Material>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM materials WHERE id = $1",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(material_from_row))
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Material>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM materials WHERE session_id = $1 ORDER BY created_at DESC",
            MATERIAL_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(material_from_row).collect())
    }

    async fn list_for_tutor(&self, tutor_id: Uuid) -> Result<Vec<Material>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM materials WHERE tutor_id = $1 ORDER BY created_at DESC",
            MATERIAL_COLUMNS
        ))
        .bind(tutor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(material_from_row).collect())
    }

    async fn list_page(&self, limit: i64, offset: i64) -> Result<(Vec<Material>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM materials
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(material_from_row).collect(), total))
    }

    async fn update(&self, id: Uuid, update: &MaterialUpdate) -> Result<Option<Material>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE materials
            SET title = $2, image_url = $3, drive_link = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.image_url)
        .bind(&update.drive_link)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(material_from_row))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
