//! In-memory stores for tests
//!
//! All collections live behind one mutex, so every trait method is atomic
//! with respect to the others, matching what the Postgres transactions give.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::Role;
use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

use super::{
    BookingStore, MaterialStore, NoteStore, Reservation, ReviewStore, SessionStore, StatsStore,
    UserStore,
};
use crate::models::{
    booking::Booking,
    material::{Material, MaterialUpdate},
    note::{Note, NoteRequest},
    review::Review,
    stats::{OverviewStats, SessionCounts, TutorStats, UserCounts},
    study_session::{SessionFilter, SessionStatus, StudySession},
    user::{ProfileUpdate, User},
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    sessions: HashMap<Uuid, StudySession>,
    bookings: Vec<Booking>,
    reviews: Vec<Review>,
    materials: Vec<Material>,
    notes: Vec<Note>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_user(&self, user: User) {
        self.lock().users.push(user);
    }

    pub fn add_session(&self, session: StudySession) {
        self.lock().sessions.insert(session.id, session);
    }

    pub fn add_booking(&self, booking: Booking) {
        self.lock().bookings.push(booking);
    }

    pub fn session(&self, id: Uuid) -> Option<StudySession> {
        self.lock().sessions.get(&id).cloned()
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.lock().bookings.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        Ok(self.lock())
    }
}

/// A registered user with the given email and role
pub fn user(email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        display_name: email.split('@').next().map(str::to_string),
        photo_url: None,
        role,
        phone: None,
        address: None,
        bio: None,
        created_at: now,
        updated_at: now,
        last_login: None,
    }
}

/// An approved session whose registration window is open at `now`
pub fn open_session(tutor: &User, fee: f64, max_capacity: i32, now: DateTime<Utc>) -> StudySession {
    StudySession {
        id: Uuid::new_v4(),
        title: "Linear Algebra".to_string(),
        description: "Vectors, matrices and eigenvalues".to_string(),
        tutor_id: tutor.id,
        tutor_name: tutor.display_name.clone().unwrap_or_default(),
        tutor_email: tutor.email.clone(),
        registration_start: now - Duration::days(1),
        registration_end: now + Duration::days(1),
        class_start: now + Duration::days(2),
        class_end: now + Duration::days(2) + Duration::hours(2),
        duration_hours: 2,
        max_capacity,
        current_enrollment: 0,
        registration_fee: fee,
        status: SessionStatus::Approved,
        rejection_reason: None,
        rejection_feedback: None,
        requirements: vec![],
        topics: vec!["matrices".to_string()],
        created_at: now - Duration::days(3),
        updated_at: now - Duration::days(3),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.available()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.available()?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn search(&self, term: Option<&str>) -> Result<Vec<User>> {
        let state = self.available()?;
        let term = term.unwrap_or("").trim().to_lowercase();
        Ok(state
            .users
            .iter()
            .filter(|u| {
                u.email.to_lowercase().contains(&term)
                    || u
                        .display_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            })
            .cloned()
            .collect())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let state = self.available()?;
        Ok(state.users.iter().filter(|u| u.role == role).cloned().collect())
    }

    async fn update_profile(&self, email: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut state = self.available()?;
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email))
        else {
            return Ok(None);
        };

        if let Some(name) = &update.display_name {
            user.display_name = Some(name.clone());
        }
        if let Some(photo) = &update.photo_url {
            user.photo_url = Some(photo.clone());
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(address) = &update.address {
            user.address = Some(address.clone());
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let mut state = self.available()?;
        Ok(state.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &StudySession) -> Result<()> {
        self.available()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<StudySession>> {
        Ok(self.available()?.sessions.get(&id).cloned())
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<StudySession>> {
        let state = self.available()?;
        let mut sessions: Vec<StudySession> = state
            .sessions
            .values()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .filter(|s| filter.tutor_id.is_none_or(|tutor| s.tutor_id == tutor))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn save_if_status(
        &self,
        session: &StudySession,
        expected: SessionStatus,
    ) -> Result<Option<StudySession>> {
        let mut state = self.available()?;
        let Some(stored) = state.sessions.get_mut(&session.id) else {
            return Ok(None);
        };
        if stored.status != expected || stored.current_enrollment > session.max_capacity {
            return Ok(None);
        }

        let current_enrollment = stored.current_enrollment;
        *stored = StudySession {
            current_enrollment,
            ..session.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete_if_unbooked(&self, id: Uuid) -> Result<bool> {
        let mut state = self.available()?;
        if state.bookings.iter().any(|b| b.session_id == id) {
            return Ok(false);
        }
        let removed = state.sessions.remove(&id).is_some();
        state.reviews.retain(|r| r.session_id != id);
        state.materials.retain(|m| m.session_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn reserve_seat(&self, booking: &Booking) -> Result<Reservation> {
        let mut state = self.available()?;

        if let Some(reference) = &booking.payment_reference {
            if let Some(existing) = state
                .bookings
                .iter()
                .find(|b| b.payment_reference.as_ref() == Some(reference))
            {
                return Ok(Reservation::Replayed(existing.clone()));
            }
        }
        if state
            .bookings
            .iter()
            .any(|b| b.session_id == booking.session_id && b.student_id == booking.student_id)
        {
            return Ok(Reservation::Duplicate);
        }

        let Some(session) = state.sessions.get_mut(&booking.session_id) else {
            return Ok(Reservation::NotBookable);
        };
        if session.status != SessionStatus::Approved {
            return Ok(Reservation::NotBookable);
        }
        if !session.has_free_seat() {
            return Ok(Reservation::Full);
        }

        session.current_enrollment += 1;
        state.bookings.push(booking.clone());
        Ok(Reservation::Booked(booking.clone()))
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Booking>> {
        let state = self.available()?;
        Ok(state
            .bookings
            .iter()
            .find(|b| b.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_for_student(
        &self,
        session_id: Uuid,
        student_email: &str,
    ) -> Result<Option<Booking>> {
        let state = self.available()?;
        Ok(state
            .bookings
            .iter()
            .find(|b| b.session_id == session_id && b.student_email.eq_ignore_ascii_case(student_email))
            .cloned())
    }

    async fn list_for_student(&self, student_email: &str) -> Result<Vec<Booking>> {
        let state = self.available()?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| b.student_email.eq_ignore_ascii_case(student_email))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(bookings)
    }

    async fn count_for_session(&self, session_id: Uuid) -> Result<i64> {
        let state = self.available()?;
        Ok(state.bookings.iter().filter(|b| b.session_id == session_id).count() as i64)
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert(&self, review: &Review) -> Result<()> {
        self.available()?.reviews.push(review.clone());
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Review>> {
        let state = self.available()?;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MaterialStore for MemoryStore {
    async fn insert(&self, material: &Material) -> Result<()> {
        self.available()?.materials.push(material.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Material>> {
        let state = self.available()?;
        Ok(state.materials.iter().find(|m| m.id == id).cloned())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Material>> {
        let state = self.available()?;
        Ok(state
            .materials
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list_for_tutor(&self, tutor_id: Uuid) -> Result<Vec<Material>> {
        let state = self.available()?;
        Ok(state
            .materials
            .iter()
            .filter(|m| m.tutor_id == tutor_id)
            .cloned()
            .collect())
    }

    async fn list_page(&self, limit: i64, offset: i64) -> Result<(Vec<Material>, i64)> {
        let state = self.available()?;
        let items = state
            .materials
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((items, state.materials.len() as i64))
    }

    async fn update(&self, id: Uuid, update: &MaterialUpdate) -> Result<Option<Material>> {
        let mut state = self.available()?;
        Ok(state.materials.iter_mut().find(|m| m.id == id).map(|material| {
            material.title = update.title.clone();
            material.image_url = update.image_url.clone();
            material.drive_link = update.drive_link.clone();
            material.updated_at = Utc::now();
            material.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.available()?;
        let before = state.materials.len();
        state.materials.retain(|m| m.id != id);
        Ok(state.materials.len() < before)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert(&self, note: &Note) -> Result<()> {
        self.available()?.notes.push(note.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Note>> {
        let state = self.available()?;
        Ok(state.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<Note>> {
        let state = self.available()?;
        Ok(state
            .notes
            .iter()
            .filter(|n| n.owner_email.eq_ignore_ascii_case(owner_email))
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, update: &NoteRequest) -> Result<Option<Note>> {
        let mut state = self.available()?;
        Ok(state.notes.iter_mut().find(|n| n.id == id).map(|note| {
            note.title = update.title.clone();
            note.description = update.description.clone();
            note.updated_at = Utc::now();
            note.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.available()?;
        let before = state.notes.len();
        state.notes.retain(|n| n.id != id);
        Ok(state.notes.len() < before)
    }
}

fn session_counts<'a>(sessions: impl Iterator<Item = &'a StudySession>) -> SessionCounts {
    sessions.fold(SessionCounts::default(), |mut counts, s| {
        counts.total += 1;
        match s.status {
            SessionStatus::Pending => counts.pending += 1,
            SessionStatus::Approved => counts.approved += 1,
            SessionStatus::Rejected => counts.rejected += 1,
        }
        counts
    })
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn overview(&self) -> Result<OverviewStats> {
        let state = self.available()?;
        let count_role = |role| state.users.iter().filter(|u| u.role == role).count() as i64;

        Ok(OverviewStats {
            users: UserCounts {
                total: state.users.len() as i64,
                students: count_role(Role::Student),
                tutors: count_role(Role::Tutor),
                admins: count_role(Role::Admin),
            },
            sessions: session_counts(state.sessions.values()),
            bookings: state.bookings.len() as i64,
            revenue: state.bookings.iter().map(|b| b.fee_paid).sum(),
        })
    }

    async fn tutor(&self, tutor_id: Uuid) -> Result<TutorStats> {
        let state = self.available()?;
        let own: Vec<&Booking> = state
            .bookings
            .iter()
            .filter(|b| {
                state
                    .sessions
                    .get(&b.session_id)
                    .is_some_and(|s| s.tutor_id == tutor_id)
            })
            .collect();
        let mut students: Vec<Uuid> = own.iter().map(|b| b.student_id).collect();
        students.sort();
        students.dedup();

        Ok(TutorStats {
            sessions: session_counts(state.sessions.values().filter(|s| s.tutor_id == tutor_id)),
            bookings: own.len() as i64,
            students: students.len() as i64,
        })
    }
}
