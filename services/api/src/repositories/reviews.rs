//! Review repository

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::ReviewStore;
use crate::models::review::Review;

#[derive(Clone)]
pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for ReviewRepository {
    async fn insert(&self, review: &Review) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, session_id, student_id, student_email, student_name, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(review.id)
        .bind(review.session_id)
        .bind(review.student_id)
        .bind(&review.student_email)
        .bind(&review.student_name)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, student_id, student_email, student_name, rating, comment, created_at
            FROM reviews
            WHERE session_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let reviews = rows
            .into_iter()
            .map(|row| Review {
                id: row.get("id"),
                session_id: row.get("session_id"),
                student_id: row.get("student_id"),
                student_email: row.get("student_email"),
                student_name: row.get("student_name"),
                rating: row.get("rating"),
                comment: row.get("comment"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(reviews)
    }
}
