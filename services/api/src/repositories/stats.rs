//! Dashboard aggregates

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::StatsStore;
use crate::models::stats::{OverviewStats, SessionCounts, TutorStats, UserCounts};

#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn session_counts(&self, tutor_id: Option<Uuid>) -> Result<SessionCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
            FROM study_sessions
            WHERE $1::UUID IS NULL OR tutor_id = $1
            "#,
        )
        .bind(tutor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionCounts {
            total: row.get("total"),
            pending: row.get("pending"),
            approved: row.get("approved"),
            rejected: row.get("rejected"),
        })
    }
}

#[async_trait]
impl StatsStore for StatsRepository {
    async fn overview(&self) -> Result<OverviewStats> {
        let users = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE role = 'student') AS students,
                COUNT(*) FILTER (WHERE role = 'tutor') AS tutors,
                COUNT(*) FILTER (WHERE role = 'admin') AS admins
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let bookings = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(fee_paid), 0)::DOUBLE PRECISION AS revenue FROM bookings",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OverviewStats {
            users: UserCounts {
                total: users.get("total"),
                students: users.get("students"),
                tutors: users.get("tutors"),
                admins: users.get("admins"),
            },
            sessions: self.session_counts(None).await?,
            bookings: bookings.get("total"),
            revenue: bookings.get("revenue"),
        })
    }

    async fn tutor(&self, tutor_id: Uuid) -> Result<TutorStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(b.id) AS bookings, COUNT(DISTINCT b.student_id) AS students
            FROM bookings b
            JOIN study_sessions s ON s.id = b.session_id
            WHERE s.tutor_id = $1
            "#,
        )
        .bind(tutor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TutorStats {
            sessions: self.session_counts(Some(tutor_id)).await?,
            bookings: row.get("bookings"),
            students: row.get("students"),
        })
    }
}
