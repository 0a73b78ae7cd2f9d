//! Dashboard statistics

use serde::Serialize;

use super::booking::Booking;

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserCounts {
    pub total: i64,
    pub students: i64,
    pub tutors: i64,
    pub admins: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionCounts {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

/// Admin overview
#[derive(Debug, Clone, Serialize)]
pub struct OverviewStats {
    pub users: UserCounts,
    pub sessions: SessionCounts,
    pub bookings: i64,
    pub revenue: f64,
}

/// Tutor dashboard figures for the tutor's own sessions
#[derive(Debug, Clone, Serialize)]
pub struct TutorStats {
    pub sessions: SessionCounts,
    pub bookings: i64,
    pub students: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingCounts {
    pub total: i64,
    pub completed: i64,
    pub upcoming: i64,
}

/// Student dashboard figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub bookings: BookingCounts,
    pub spending: f64,
    pub recent_bookings: Vec<Booking>,
}
