//! Study session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Review status of a study session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Approved => "approved",
            SessionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "approved" => Ok(SessionStatus::Approved),
            "rejected" => Ok(SessionStatus::Rejected),
            other => Err(anyhow::anyhow!("unknown session status: {}", other)),
        }
    }
}

/// A scheduled tutoring offering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tutor_id: Uuid,
    pub tutor_name: String,
    pub tutor_email: String,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub class_start: DateTime<Utc>,
    pub class_end: DateTime<Utc>,
    pub duration_hours: i32,
    pub max_capacity: i32,
    pub current_enrollment: i32,
    pub registration_fee: f64,
    pub status: SessionStatus,
    pub rejection_reason: Option<String>,
    pub rejection_feedback: Option<String>,
    pub requirements: Vec<String>,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudySession {
    /// Whether `now` lies inside the registration window, bounds included
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.registration_start <= now && now <= self.registration_end
    }

    pub fn has_free_seat(&self) -> bool {
        self.current_enrollment < self.max_capacity
    }

    pub fn is_paid(&self) -> bool {
        self.registration_fee > 0.0
    }

    /// Registration fee in the smallest currency unit
    pub fn fee_in_cents(&self) -> i64 {
        (self.registration_fee * 100.0).round() as i64
    }
}

/// Tutor-editable fields, shared by create and both edit paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub title: String,
    pub description: String,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub class_start: DateTime<Utc>,
    pub class_end: DateTime<Utc>,
    #[serde(alias = "duration")]
    pub duration_hours: i32,
    #[serde(alias = "maxStudents")]
    pub max_capacity: i32,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Only honoured on the admin edit path
    #[serde(default)]
    pub registration_fee: Option<f64>,
}

/// Whether an approved session charges a fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Free,
    Paid,
}

/// Admin approval payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    /// Inferred from the fee when absent
    pub fee_type: Option<FeeType>,
    #[serde(default)]
    pub registration_fee: f64,
}

/// Admin rejection payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub rejection_reason: Option<String>,
    pub rejection_feedback: Option<String>,
}

/// Listing filter
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    #[serde(skip)]
    pub tutor_id: Option<Uuid>,
}

/// Session with the caller's booking state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: StudySession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_booked: Option<bool>,
    pub seats_left: i32,
}

/// Query parameters for session deletion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}
