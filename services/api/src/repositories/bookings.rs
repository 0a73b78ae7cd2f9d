//! Booking repository
//!
//! [`BookingRepository::reserve_seat`] runs the booking insert and the
//! enrollment increment in one transaction. The increment is a conditional
//! update, so two requests racing for the last seat serialize on the session
//! row and only one of them sees an affected row.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;
use uuid::Uuid;

use super::{BookingStore, Reservation};
use crate::models::booking::Booking;

const BOOKING_COLUMNS: &str = "id, session_id, student_id, student_email, student_name, \
     tutor_name, tutor_email, session_title, class_start, class_end, fee_paid, \
     payment_reference, booked_at";

/// Booking repository for database operations
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn booking_from_row(row: &PgRow) -> Booking {
    Booking {
        id: row.get("id"),
        session_id: row.get("session_id"),
        student_id: row.get("student_id"),
        student_email: row.get("student_email"),
        student_name: row.get("student_name"),
        tutor_name: row.get("tutor_name"),
        tutor_email: row.get("tutor_email"),
        session_title: row.get("session_title"),
        class_start: row.get("class_start"),
        class_end: row.get("class_end"),
        fee_paid: row.get("fee_paid"),
        payment_reference: row.get("payment_reference"),
        booked_at: row.get("booked_at"),
    }
}

#[async_trait]
impl BookingStore for BookingRepository {
    async fn reserve_seat(&self, booking: &Booking) -> Result<Reservation> {
        let mut tx = self.pool.begin().await?;

        // Unique constraints on (session_id, student_id) and payment_reference
        // make a concurrent duplicate wait here and then insert nothing.
        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, session_id, student_id, student_email, student_name,
                tutor_name, tutor_email, session_title, class_start, class_end,
                fee_paid, payment_reference, booked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(booking.id)
        .bind(booking.session_id)
        .bind(booking.student_id)
        .bind(&booking.student_email)
        .bind(&booking.student_name)
        .bind(&booking.tutor_name)
        .bind(&booking.tutor_email)
        .bind(&booking.session_title)
        .bind(booking.class_start)
        .bind(booking.class_end)
        .bind(booking.fee_paid)
        .bind(&booking.payment_reference)
        .bind(booking.booked_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;

            if let Some(reference) = &booking.payment_reference {
                if let Some(existing) = self.find_by_payment_reference(reference).await? {
                    debug!("Payment reference {} already booked", reference);
                    return Ok(Reservation::Replayed(existing));
                }
            }
            return Ok(Reservation::Duplicate);
        }

        let seat = sqlx::query(
            r#"
            UPDATE study_sessions
            SET current_enrollment = current_enrollment + 1
            WHERE id = $1
              AND status = 'approved'
              AND current_enrollment < max_capacity
            "#,
        )
        .bind(booking.session_id)
        .execute(&mut *tx)
        .await?;

        if seat.rows_affected() == 0 {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM study_sessions WHERE id = $1")
                    .bind(booking.session_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Ok(match status.as_deref() {
                Some("approved") => Reservation::Full,
                _ => Reservation::NotBookable,
            });
        }

        tx.commit().await?;
        Ok(Reservation::Booked(booking.clone()))
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE payment_reference = $1",
            BOOKING_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(booking_from_row))
    }

    async fn find_for_student(
        &self,
        session_id: Uuid,
        student_email: &str,
    ) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE session_id = $1 AND lower(student_email) = lower($2)",
            BOOKING_COLUMNS
        ))
        .bind(session_id)
        .bind(student_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(booking_from_row))
    }

    async fn list_for_student(&self, student_email: &str) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE lower(student_email) = lower($1)
            ORDER BY booked_at DESC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(student_email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(booking_from_row).collect())
    }

    async fn count_for_session(&self, session_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
