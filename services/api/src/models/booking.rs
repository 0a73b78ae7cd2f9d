//! Booking models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed seat reservation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub student_email: String,
    pub student_name: String,
    pub tutor_name: String,
    pub tutor_email: String,
    pub session_title: String,
    pub class_start: DateTime<Utc>,
    pub class_end: DateTime<Utc>,
    pub fee_paid: f64,
    /// Processor transaction reference, present iff `fee_paid > 0`
    pub payment_reference: Option<String>,
    pub booked_at: DateTime<Utc>,
}

/// Free booking request; any denormalized fields the client sends are ignored
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub session_id: Uuid,
}

/// Paid booking request sent after the processor confirmed the payment
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub session_id: Uuid,
    pub payment_intent_id: String,
}

/// Request for a payment intent; the amount is derived from the session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

/// Where a booked class stands relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassProgress {
    Upcoming,
    Ongoing,
    Completed,
}

impl ClassProgress {
    pub fn at(class_start: DateTime<Utc>, class_end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < class_start {
            ClassProgress::Upcoming
        } else if now < class_end {
            ClassProgress::Ongoing
        } else {
            ClassProgress::Completed
        }
    }
}

/// Entry of the student's booked-sessions list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSession {
    #[serde(flatten)]
    pub booking: Booking,
    pub progress: ClassProgress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSessionsQuery {
    pub student_email: String,
}
