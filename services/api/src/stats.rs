//! Dashboard statistics

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    identity::Principal,
    models::{
        booking::{Booking, ClassProgress},
        stats::{BookingCounts, OverviewStats, StudentStats, TutorStats},
    },
    repositories::{BookingStore, StatsStore},
};

const RECENT_BOOKINGS: usize = 5;

/// Student figures from the student's bookings, newest first
pub fn student_stats(bookings: Vec<Booking>, now: DateTime<Utc>) -> StudentStats {
    let mut counts = BookingCounts {
        total: bookings.len() as i64,
        ..Default::default()
    };
    for booking in &bookings {
        match ClassProgress::at(booking.class_start, booking.class_end, now) {
            ClassProgress::Completed => counts.completed += 1,
            ClassProgress::Upcoming => counts.upcoming += 1,
            ClassProgress::Ongoing => {}
        }
    }

    StudentStats {
        bookings: counts,
        spending: bookings.iter().map(|b| b.fee_paid).sum(),
        recent_bookings: bookings.into_iter().take(RECENT_BOOKINGS).collect(),
    }
}

#[derive(Clone)]
pub struct StatsService {
    stats: Arc<dyn StatsStore>,
    bookings: Arc<dyn BookingStore>,
}

impl StatsService {
    pub fn new(stats: Arc<dyn StatsStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { stats, bookings }
    }

    pub async fn overview(&self) -> ApiResult<OverviewStats> {
        self.stats.overview().await.map_err(ApiError::transient)
    }

    pub async fn tutor(&self, tutor: &Principal) -> ApiResult<TutorStats> {
        self.stats.tutor(tutor.id).await.map_err(ApiError::transient)
    }

    pub async fn student(&self, student: &Principal, now: DateTime<Utc>) -> ApiResult<StudentStats> {
        let bookings = self
            .bookings
            .list_for_student(&student.email)
            .await
            .map_err(ApiError::transient)?;
        Ok(student_stats(bookings, now))
    }
}
