//! Study session state machine
//!
//! ```text
//!   create ──► pending ──approve──► approved ──edit / delete
//!                 │  ▲
//!              reject resubmit
//!                 ▼  │
//!               rejected
//! ```
//!
//! Every function here is pure: it checks the actor's role, then the current
//! status, then the input, and returns the next version of the session
//! without touching storage. Persisting it is the caller's job.

use chrono::{DateTime, Utc};
use common::Role;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, FieldError},
    identity::Principal,
    models::study_session::{
        ApproveRequest, FeeType, RejectRequest, SessionDraft, SessionStatus, StudySession,
    },
};

/// Shared validator for create and both edit paths
pub fn validate_draft(draft: &SessionDraft) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    }
    if draft.description.trim().is_empty() {
        errors.push(FieldError::new("description", "description is required"));
    }
    if draft.max_capacity <= 0 {
        errors.push(FieldError::new("max_capacity", "must be greater than 0"));
    }
    if draft.duration_hours <= 0 {
        errors.push(FieldError::new("duration_hours", "must be greater than 0"));
    }
    if draft.registration_start >= draft.registration_end {
        errors.push(FieldError::new(
            "registration_start/registration_end",
            "registration must start before it ends",
        ));
    }
    if draft.class_start >= draft.class_end {
        errors.push(FieldError::new(
            "class_start/class_end",
            "class must start before it ends",
        ));
    }
    if draft.class_start <= draft.registration_end {
        errors.push(FieldError::new(
            "registration_end/class_start",
            "class must start after registration closes",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn require_role(actor: &Principal, role: Role) -> ApiResult<()> {
    if actor.is(role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn require_owner(actor: &Principal, session: &StudySession) -> ApiResult<()> {
    require_role(actor, Role::Tutor)?;
    if session.tutor_id == actor.id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn require_status(
    session: &StudySession,
    expected: SessionStatus,
    action: &'static str,
) -> ApiResult<()> {
    if session.status == expected {
        Ok(())
    } else {
        Err(ApiError::InvalidTransition {
            from: session.status,
            action,
        })
    }
}

fn validate_edit(session: &StudySession, draft: &SessionDraft) -> ApiResult<()> {
    let mut errors = validate_draft(draft).err().unwrap_or_default();

    if draft.max_capacity > 0 && draft.max_capacity < session.current_enrollment {
        errors.push(FieldError::new(
            "max_capacity",
            format!(
                "cannot be lower than current enrollment ({})",
                session.current_enrollment
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn validate_fee(fee: f64) -> ApiResult<()> {
    if fee.is_finite() && fee >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::invalid("registration_fee", "must be 0 or more"))
    }
}

/// Copy the tutor-editable fields of `draft` onto `session`
fn apply_draft(session: &mut StudySession, draft: SessionDraft, now: DateTime<Utc>) {
    session.title = draft.title.trim().to_string();
    session.description = draft.description.trim().to_string();
    session.registration_start = draft.registration_start;
    session.registration_end = draft.registration_end;
    session.class_start = draft.class_start;
    session.class_end = draft.class_end;
    session.duration_hours = draft.duration_hours;
    session.max_capacity = draft.max_capacity;
    session.requirements = draft.requirements;
    session.topics = draft.topics;
    session.updated_at = now;
}

/// New pending session owned by `tutor`; any fee in the draft is ignored
pub fn create(tutor: &Principal, draft: SessionDraft, now: DateTime<Utc>) -> ApiResult<StudySession> {
    require_role(tutor, Role::Tutor)?;
    validate_draft(&draft).map_err(ApiError::Validation)?;

    let mut session = StudySession {
        id: Uuid::new_v4(),
        title: String::new(),
        description: String::new(),
        tutor_id: tutor.id,
        tutor_name: tutor.name.clone(),
        tutor_email: tutor.email.clone(),
        registration_start: draft.registration_start,
        registration_end: draft.registration_end,
        class_start: draft.class_start,
        class_end: draft.class_end,
        duration_hours: 0,
        max_capacity: 0,
        current_enrollment: 0,
        registration_fee: 0.0,
        status: SessionStatus::Pending,
        rejection_reason: None,
        rejection_feedback: None,
        requirements: Vec::new(),
        topics: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    apply_draft(&mut session, draft, now);

    Ok(session)
}

/// pending → approved, setting the fee
pub fn approve(
    actor: &Principal,
    session: &StudySession,
    input: &ApproveRequest,
    now: DateTime<Utc>,
) -> ApiResult<StudySession> {
    require_role(actor, Role::Admin)?;
    require_status(session, SessionStatus::Pending, "approve")?;
    validate_fee(input.registration_fee)?;

    let fee_type = input.fee_type.unwrap_or(if input.registration_fee > 0.0 {
        FeeType::Paid
    } else {
        FeeType::Free
    });
    let fee = match fee_type {
        FeeType::Free => 0.0,
        FeeType::Paid => {
            if input.registration_fee <= 0.0 {
                return Err(ApiError::invalid(
                    "registration_fee",
                    "a paid session needs a fee greater than 0",
                ));
            }
            input.registration_fee
        }
    };

    Ok(StudySession {
        status: SessionStatus::Approved,
        registration_fee: fee,
        rejection_reason: None,
        rejection_feedback: None,
        updated_at: now,
        ..session.clone()
    })
}

/// pending → rejected with a mandatory reason
pub fn reject(
    actor: &Principal,
    session: &StudySession,
    input: &RejectRequest,
    now: DateTime<Utc>,
) -> ApiResult<StudySession> {
    require_role(actor, Role::Admin)?;
    require_status(session, SessionStatus::Pending, "reject")?;

    let reason = input
        .rejection_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::invalid("rejection_reason", "a rejection reason is required"))?;
    let feedback = input
        .rejection_feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    Ok(StudySession {
        status: SessionStatus::Rejected,
        rejection_reason: Some(reason.to_string()),
        rejection_feedback: feedback,
        updated_at: now,
        ..session.clone()
    })
}

/// rejected → pending, by the owning tutor only
pub fn resubmit(
    actor: &Principal,
    session: &StudySession,
    now: DateTime<Utc>,
) -> ApiResult<StudySession> {
    require_owner(actor, session)?;
    require_status(session, SessionStatus::Rejected, "resubmit")?;

    Ok(StudySession {
        status: SessionStatus::Pending,
        rejection_reason: None,
        rejection_feedback: None,
        updated_at: now,
        ..session.clone()
    })
}

/// Admin edit of an approved session, fee included
pub fn edit_as_admin(
    actor: &Principal,
    session: &StudySession,
    draft: SessionDraft,
    now: DateTime<Utc>,
) -> ApiResult<StudySession> {
    require_role(actor, Role::Admin)?;
    require_status(session, SessionStatus::Approved, "edit")?;
    validate_edit(session, &draft)?;

    let fee = draft.registration_fee.unwrap_or(session.registration_fee);
    validate_fee(fee)?;

    let mut edited = session.clone();
    apply_draft(&mut edited, draft, now);
    edited.registration_fee = fee;
    Ok(edited)
}

/// Tutor edit of their own approved session; the fee stays as approved
pub fn edit_as_tutor(
    actor: &Principal,
    session: &StudySession,
    draft: SessionDraft,
    now: DateTime<Utc>,
) -> ApiResult<StudySession> {
    require_owner(actor, session)?;
    require_status(session, SessionStatus::Approved, "edit")?;
    validate_edit(session, &draft)?;

    let mut edited = session.clone();
    apply_draft(&mut edited, draft, now);
    Ok(edited)
}

/// Only admins delete, and only approved sessions
pub fn ensure_deletable(actor: &Principal, session: &StudySession) -> ApiResult<()> {
    require_role(actor, Role::Admin)?;
    require_status(session, SessionStatus::Approved, "delete")
}
