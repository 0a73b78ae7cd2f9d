//! Repositories for database operations
//!
//! Each store is a trait so the services can run against Postgres in
//! production and against [`memory::MemoryStore`] in tests.

use anyhow::Result;
use async_trait::async_trait;
use common::Role;
use uuid::Uuid;

use crate::models::{
    booking::Booking,
    material::{Material, MaterialUpdate},
    note::{Note, NoteRequest},
    review::Review,
    stats::{OverviewStats, TutorStats},
    study_session::{SessionFilter, SessionStatus, StudySession},
    user::{ProfileUpdate, User},
};

pub mod bookings;
pub mod materials;
pub mod notes;
pub mod reviews;
pub mod sessions;
pub mod stats;
pub mod users;

#[cfg(test)]
pub mod memory;


pub use bookings::BookingRepository;
pub use materials::MaterialRepository;
pub use notes::NoteRepository;
pub use reviews::ReviewRepository;
pub use sessions::SessionRepository;
pub use stats::StatsRepository;
pub use users::UserRepository;

/// Outcome of an atomic seat reservation
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// Seat taken and booking stored
    Booked(Booking),
    /// A booking with the same payment reference already exists
    Replayed(Booking),
    /// The student already holds a seat in the session
    Duplicate,
    /// No seat left
    Full,
    /// The session is gone or no longer approved
    NotBookable,
}

/// Application user directory
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Case-insensitive match on name or email; everyone when `term` is empty
    async fn search(&self, term: Option<&str>) -> Result<Vec<User>>;
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>>;
    async fn update_profile(&self, email: &str, update: &ProfileUpdate) -> Result<Option<User>>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;
}

/// Study session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &StudySession) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<StudySession>>;
    async fn list(&self, filter: SessionFilter) -> Result<Vec<StudySession>>;

    /// Write every mutable field except `current_enrollment`, but only while
    /// the stored status still equals `expected` and the stored enrollment
    /// fits the new capacity. Returns `None` when the guard did not match.
    async fn save_if_status(
        &self,
        session: &StudySession,
        expected: SessionStatus,
    ) -> Result<Option<StudySession>>;

    /// Delete the session unless it has bookings. Returns whether a row was removed.
    async fn delete_if_unbooked(&self, id: Uuid) -> Result<bool>;
}

/// Booking persistence
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert the booking and take one seat of its session as a single
    /// atomic step
    async fn reserve_seat(&self, booking: &Booking) -> Result<Reservation>;
    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Booking>>;
    async fn find_for_student(&self, session_id: Uuid, student_email: &str)
    -> Result<Option<Booking>>;
    async fn list_for_student(&self, student_email: &str) -> Result<Vec<Booking>>;
    async fn count_for_session(&self, session_id: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert(&self, review: &Review) -> Result<()>;
    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Review>>;
}

#[async_trait]
pub trait MaterialStore: Send + Sync {
    async fn insert(&self, material: &Material) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<Material>>;
    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Material>>;
    async fn list_for_tutor(&self, tutor_id: Uuid) -> Result<Vec<Material>>;
    /// One page of all materials plus the total count
    async fn list_page(&self, limit: i64, offset: i64) -> Result<(Vec<Material>, i64)>;
    async fn update(&self, id: Uuid, update: &MaterialUpdate) -> Result<Option<Material>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(&self, note: &Note) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<Note>>;
    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<Note>>;
    async fn update(&self, id: Uuid, update: &NoteRequest) -> Result<Option<Note>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Aggregates for the dashboards
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn overview(&self) -> Result<OverviewStats>;
    async fn tutor(&self, tutor_id: Uuid) -> Result<TutorStats>;
}
