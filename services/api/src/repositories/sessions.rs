//! Study session repository

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::SessionStore;
use crate::models::study_session::{SessionFilter, SessionStatus, StudySession};

const SESSION_COLUMNS: &str = "id, title, description, tutor_id, tutor_name, tutor_email, \
     registration_start, registration_end, class_start, class_end, duration_hours, \
     max_capacity, current_enrollment, registration_fee, status, rejection_reason, \
     rejection_feedback, requirements, topics, created_at, updated_at";

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> Result<StudySession> {
    let status: String = row.get("status");

    Ok(StudySession {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        tutor_id: row.get("tutor_id"),
        tutor_name: row.get("tutor_name"),
        tutor_email: row.get("tutor_email"),
        registration_start: row.get("registration_start"),
        registration_end: row.get("registration_end"),
        class_start: row.get("class_start"),
        class_end: row.get("class_end"),
        duration_hours: row.get("duration_hours"),
        max_capacity: row.get("max_capacity"),
        current_enrollment: row.get("current_enrollment"),
        registration_fee: row.get("registration_fee"),
        status: status.parse()?,
        rejection_reason: row.get("rejection_reason"),
        rejection_feedback: row.get("rejection_feedback"),
        requirements: row.get("requirements"),
        topics: row.get("topics"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn insert(&self, session: &StudySession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO study_sessions (
                id, title, description, tutor_id, tutor_name, tutor_email,
                registration_start, registration_end, class_start, class_end,
                duration_hours, max_capacity, current_enrollment, registration_fee,
                status, requirements, topics, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(session.id)
        .bind(&session.title)
        .bind(&session.description)
        .bind(session.tutor_id)
        .bind(&session.tutor_name)
        .bind(&session.tutor_email)
        .bind(session.registration_start)
        .bind(session.registration_end)
        .bind(session.class_start)
        .bind(session.class_end)
        .bind(session.duration_hours)
        .bind(session.max_capacity)
        .bind(session.current_enrollment)
        .bind(session.registration_fee)
        .bind(session.status.as_str())
        .bind(&session.requirements)
        .bind(&session.topics)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<StudySession>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM study_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<StudySession>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM study_sessions
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR tutor_id = $2)
            ORDER BY created_at DESC
            "#,
            SESSION_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.tutor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    async fn save_if_status(
        &self,
        session: &StudySession,
        expected: SessionStatus,
    ) -> Result<Option<StudySession>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE study_sessions
            SET title = $3,
                description = $4,
                registration_start = $5,
                registration_end = $6,
                class_start = $7,
                class_end = $8,
                duration_hours = $9,
                max_capacity = $10,
                registration_fee = $11,
                status = $12,
                rejection_reason = $13,
                rejection_feedback = $14,
                requirements = $15,
                topics = $16,
                updated_at = $17
            WHERE id = $1 AND status = $2 AND current_enrollment <= $10
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(session.id)
        .bind(expected.as_str())
        .bind(&session.title)
        .bind(&session.description)
        .bind(session.registration_start)
        .bind(session.registration_end)
        .bind(session.class_start)
        .bind(session.class_end)
        .bind(session.duration_hours)
        .bind(session.max_capacity)
        .bind(session.registration_fee)
        .bind(session.status.as_str())
        .bind(&session.rejection_reason)
        .bind(&session.rejection_feedback)
        .bind(&session.requirements)
        .bind(&session.topics)
        .bind(session.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn delete_if_unbooked(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM study_sessions
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM bookings WHERE session_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
