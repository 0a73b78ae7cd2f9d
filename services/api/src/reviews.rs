//! Session reviews

use chrono::{DateTime, Utc};
use common::Role;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, FieldError},
    identity::Principal,
    models::review::{NewReviewRequest, Review, ReviewSummary},
    repositories::{BookingStore, ReviewStore},
};

/// Mean rating, 0 when there are no reviews
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let total: f64 = reviews.iter().map(|r| f64::from(r.rating)).sum();
    total / reviews.len() as f64
}

#[derive(Clone)]
pub struct ReviewService {
    reviews: Arc<dyn ReviewStore>,
    bookings: Arc<dyn BookingStore>,
}

impl ReviewService {
    pub fn new(reviews: Arc<dyn ReviewStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { reviews, bookings }
    }

    /// Add a review; only students holding a booking for the session may
    pub async fn add_review(
        &self,
        student: &Principal,
        request: NewReviewRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<Review> {
        if !student.is(Role::Student) {
            return Err(ApiError::Forbidden);
        }

        let mut errors = Vec::new();
        if !(1..=5).contains(&request.rating) {
            errors.push(FieldError::new("rating", "must be between 1 and 5"));
        }
        if request.comment.trim().is_empty() {
            errors.push(FieldError::new("comment", "comment is required"));
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let booked = self
            .bookings
            .find_for_student(request.session_id, &student.email)
            .await
            .map_err(ApiError::transient)?;
        if booked.is_none() {
            return Err(ApiError::Forbidden);
        }

        let review = Review {
            id: Uuid::new_v4(),
            session_id: request.session_id,
            student_id: student.id,
            student_email: student.email.clone(),
            student_name: student.name.clone(),
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            created_at: now,
        };
        self.reviews
            .insert(&review)
            .await
            .map_err(ApiError::transient)?;

        info!(
            "Review {} ({}/5) added to session {}",
            review.id, review.rating, review.session_id
        );
        Ok(review)
    }

    pub async fn summary(&self, session_id: Uuid) -> ApiResult<ReviewSummary> {
        let reviews = self
            .reviews
            .list_for_session(session_id)
            .await
            .map_err(ApiError::transient)?;

        Ok(ReviewSummary {
            average_rating: average_rating(&reviews),
            count: reviews.len(),
            reviews,
        })
    }
}
