//! Session lifecycle service
//!
//! Loads sessions, runs the pure transitions in [`crate::lifecycle`] and
//! persists the result with a status guard, so two admins acting on the same
//! pending session cannot both win.

use chrono::Utc;
use common::Role;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    identity::Principal,
    lifecycle,
    models::{
        Outcome,
        study_session::{
            ApproveRequest, RejectRequest, SessionDetails, SessionDraft, SessionFilter,
            SessionStatus, StudySession,
        },
    },
    repositories::{BookingStore, SessionStore},
};

#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    bookings: Arc<dyn BookingStore>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { sessions, bookings }
    }

    pub async fn create(&self, tutor: &Principal, draft: SessionDraft) -> ApiResult<StudySession> {
        let session = lifecycle::create(tutor, draft, Utc::now())?;
        self.sessions
            .insert(&session)
            .await
            .map_err(ApiError::transient)?;

        info!("Session {} created by {}", session.id, tutor.email);
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<StudySession> {
        self.sessions
            .find(id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Session"))
    }

    /// Session plus seats left, as seen by `viewer`
    ///
    /// Sessions that are not approved are only visible to admins and the
    /// owning tutor. `isBooked` is reported to students only, for their own
    /// booking.
    pub async fn details(&self, id: Uuid, viewer: Option<&Principal>) -> ApiResult<SessionDetails> {
        let session = self.get(id).await?;

        let visible = session.status == SessionStatus::Approved
            || viewer.is_some_and(|v| v.is(Role::Admin) || v.id == session.tutor_id);
        if !visible {
            return Err(ApiError::NotFound("Session"));
        }

        let is_booked = match viewer.filter(|v| v.is(Role::Student)) {
            Some(student) => Some(
                self.bookings
                    .find_for_student(id, &student.email)
                    .await
                    .map_err(ApiError::transient)?
                    .is_some(),
            ),
            None => None,
        };

        Ok(SessionDetails {
            seats_left: session.max_capacity - session.current_enrollment,
            is_booked,
            session,
        })
    }

    pub async fn list(&self, filter: SessionFilter) -> ApiResult<Vec<StudySession>> {
        self.sessions.list(filter).await.map_err(ApiError::transient)
    }

    pub async fn list_approved(&self) -> ApiResult<Vec<StudySession>> {
        self.list(SessionFilter {
            status: Some(SessionStatus::Approved),
            tutor_id: None,
        })
        .await
    }

    /// Sessions owned by the calling tutor
    pub async fn list_for_tutor(
        &self,
        tutor: &Principal,
        status: Option<SessionStatus>,
    ) -> ApiResult<Vec<StudySession>> {
        self.list(SessionFilter {
            status,
            tutor_id: Some(tutor.id),
        })
        .await
    }

    pub async fn approve(
        &self,
        admin: &Principal,
        id: Uuid,
        input: &ApproveRequest,
    ) -> ApiResult<StudySession> {
        self.transition(id, "approve", |s| {
            lifecycle::approve(admin, s, input, Utc::now())
        })
        .await
    }

    pub async fn reject(
        &self,
        admin: &Principal,
        id: Uuid,
        input: &RejectRequest,
    ) -> ApiResult<StudySession> {
        self.transition(id, "reject", |s| {
            lifecycle::reject(admin, s, input, Utc::now())
        })
        .await
    }

    pub async fn resubmit(&self, tutor: &Principal, id: Uuid) -> ApiResult<StudySession> {
        self.transition(id, "resubmit", |s| lifecycle::resubmit(tutor, s, Utc::now()))
            .await
    }

    pub async fn edit_as_admin(
        &self,
        admin: &Principal,
        id: Uuid,
        draft: SessionDraft,
    ) -> ApiResult<StudySession> {
        self.transition(id, "edit", |s| {
            lifecycle::edit_as_admin(admin, s, draft, Utc::now())
        })
        .await
    }

    pub async fn edit_as_tutor(
        &self,
        tutor: &Principal,
        id: Uuid,
        draft: SessionDraft,
    ) -> ApiResult<StudySession> {
        self.transition(id, "edit", |s| {
            lifecycle::edit_as_tutor(tutor, s, draft, Utc::now())
        })
        .await
    }

    /// Delete an approved session
    ///
    /// Without `confirm` nothing is deleted and the caller is asked to repeat
    /// the request with confirmation.
    pub async fn delete(&self, admin: &Principal, id: Uuid, confirm: bool) -> ApiResult<Outcome<()>> {
        let session = self.get(id).await?;
        lifecycle::ensure_deletable(admin, &session)?;

        if !confirm {
            return Ok(Outcome::ConfirmationRequired {
                message: format!(
                    "Delete \"{}\"? Its reviews and materials are removed too.",
                    session.title
                ),
            });
        }

        let booked = self
            .bookings
            .count_for_session(id)
            .await
            .map_err(ApiError::transient)?;
        if booked > 0 {
            return Err(ApiError::invalid(
                "session",
                format!("session has {} booking(s) and cannot be deleted", booked),
            ));
        }

        let deleted = self
            .sessions
            .delete_if_unbooked(id)
            .await
            .map_err(ApiError::transient)?;
        if !deleted {
            // Booked or removed between the checks above and the delete
            self.get(id).await?;
            return Err(ApiError::invalid(
                "session",
                "session has bookings and cannot be deleted",
            ));
        }

        info!("Session {} deleted by {}", id, admin.email);
        Ok(Outcome::Done(()))
    }

    async fn transition<F>(&self, id: Uuid, action: &'static str, apply: F) -> ApiResult<StudySession>
    where
        F: FnOnce(&StudySession) -> ApiResult<StudySession>,
    {
        let current = self.get(id).await?;
        let next = apply(&current)?;

        let saved = self
            .sessions
            .save_if_status(&next, current.status)
            .await
            .map_err(ApiError::transient)?;

        match saved {
            Some(saved) => {
                info!(
                    "Session {}: {} ({} -> {})",
                    id, action, current.status, saved.status
                );
                Ok(saved)
            }
            None => {
                let latest = self.get(id).await?;
                warn!("Session {}: {} lost a concurrent update", id, action);
                if latest.status != current.status {
                    Err(ApiError::InvalidTransition {
                        from: latest.status,
                        action,
                    })
                } else {
                    Err(ApiError::invalid(
                        "max_capacity",
                        format!(
                            "cannot be lower than current enrollment ({})",
                            latest.current_enrollment
                        ),
                    ))
                }
            }
        }
    }
}
