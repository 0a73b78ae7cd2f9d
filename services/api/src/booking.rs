//! Booking and capacity
//!
//! Preconditions are checked in a fixed order and the first failure wins:
//! the session exists and is approved, registration is open, the caller is a
//! student, the student has no seat yet, a seat is left. The last two are
//! re-checked atomically by [`BookingStore::reserve_seat`], which is what
//! actually prevents overbooking under concurrent requests.

use chrono::{DateTime, Utc};
use common::Role;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    identity::Principal,
    models::{
        booking::{BookedSession, Booking, ClassProgress, PaymentConfirmation, PaymentIntentResponse},
        study_session::{SessionStatus, StudySession},
    },
    payments::PaymentGateway,
    repositories::{BookingStore, Reservation, SessionStore},
};

/// Processor intent ids look like `pi_3MtwBwLkdIwHu7ix28a3tqPa`
fn is_payment_reference(value: &str) -> bool {
    static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = REFERENCE_REGEX.get_or_init(|| {
        Regex::new(r"^pi_[A-Za-z0-9_]+$").expect("Failed to compile payment reference regex")
    });
    regex.is_match(value)
}

#[derive(Clone)]
pub struct BookingService {
    sessions: Arc<dyn SessionStore>,
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentGateway>,
    currency: String,
}

impl BookingService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            bookings,
            payments,
            currency: currency.into().to_lowercase(),
        }
    }

    /// Book a seat in a free session
    pub async fn book_free(
        &self,
        student: &Principal,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<Booking> {
        let session = self.bookable(student, session_id, now).await?;
        if session.is_paid() {
            return Err(ApiError::PaymentNotConfirmed("payment required".to_string()));
        }

        self.reserve(student, &session, None, now).await
    }

    /// Book a seat in a paid session after the processor confirmed payment
    ///
    /// Replaying a confirmation that already produced a booking returns that
    /// booking, even once registration has closed.
    pub async fn book_paid(
        &self,
        student: &Principal,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> ApiResult<Booking> {
        let reference = confirmation.payment_intent_id.trim();
        if reference.is_empty() {
            return Err(ApiError::invalid("payment_intent_id", "payment reference is required"));
        }
        if !is_payment_reference(reference) {
            return Err(ApiError::invalid(
                "payment_intent_id",
                "payment reference is malformed",
            ));
        }

        if let Some(existing) = self
            .bookings
            .find_by_payment_reference(reference)
            .await
            .map_err(ApiError::transient)?
        {
            return Self::replayed(student, confirmation.session_id, existing);
        }

        let session = self.bookable(student, confirmation.session_id, now).await?;
        if !session.is_paid() {
            return Err(ApiError::SessionNotBookable("session is free".to_string()));
        }

        self.verify_payment(&session, reference).await?;
        self.reserve(student, &session, Some(reference.to_string()), now)
            .await
    }

    /// Open a payment intent for the session fee; the amount never comes from
    /// the client
    pub async fn create_payment_intent(
        &self,
        student: &Principal,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<PaymentIntentResponse> {
        let session = self.bookable(student, session_id, now).await?;
        if !session.is_paid() {
            return Err(ApiError::SessionNotBookable("session is free".to_string()));
        }

        let metadata = [
            ("session_id", session.id.to_string()),
            ("student_email", student.email.clone()),
        ];
        let intent = self
            .payments
            .create_intent(session.fee_in_cents(), &self.currency, &metadata)
            .await
            .map_err(ApiError::transient)?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            warn!("Payment intent {} came back without a client secret", intent.id);
            ApiError::InternalServerError
        })?;

        Ok(PaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    /// Bookings of `student_email` with their class progress; students only
    /// see their own
    pub async fn booked_sessions(
        &self,
        caller: &Principal,
        student_email: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Vec<BookedSession>> {
        if !caller.email.eq_ignore_ascii_case(student_email.trim()) {
            return Err(ApiError::Forbidden);
        }

        let bookings = self
            .bookings
            .list_for_student(&caller.email)
            .await
            .map_err(ApiError::transient)?;

        Ok(bookings
            .into_iter()
            .map(|booking| BookedSession {
                progress: ClassProgress::at(booking.class_start, booking.class_end, now),
                booking,
            })
            .collect())
    }

    async fn bookable(
        &self,
        student: &Principal,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<StudySession> {
        let session = self
            .sessions
            .find(session_id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Session"))?;

        if session.status != SessionStatus::Approved {
            return Err(ApiError::SessionNotBookable(format!(
                "session is {}",
                session.status
            )));
        }
        if !session.is_registration_open(now) {
            return Err(ApiError::SessionNotBookable(
                "registration is closed".to_string(),
            ));
        }
        if !student.is(Role::Student) {
            return Err(ApiError::Forbidden);
        }
        if self
            .bookings
            .find_for_student(session.id, &student.email)
            .await
            .map_err(ApiError::transient)?
            .is_some()
        {
            return Err(ApiError::DuplicateBooking);
        }
        if !session.has_free_seat() {
            return Err(ApiError::CapacityExceeded);
        }

        Ok(session)
    }

    async fn verify_payment(&self, session: &StudySession, reference: &str) -> ApiResult<()> {
        let intent = self
            .payments
            .retrieve_intent(reference)
            .await
            .map_err(ApiError::transient)?
            .ok_or_else(|| ApiError::PaymentNotConfirmed("unknown payment".to_string()))?;

        if intent.id != reference {
            warn!("Payment lookup for {} returned intent {}", reference, intent.id);
            return Err(ApiError::PaymentNotConfirmed("unknown payment".to_string()));
        }
        let session_id = session.id.to_string();
        if intent.metadata.get("session_id") != Some(&session_id) {
            warn!(
                "Payment {} was opened for session {:?}, presented for {}",
                reference,
                intent.metadata.get("session_id"),
                session.id
            );
            return Err(ApiError::PaymentNotConfirmed(
                "payment was made for another session".to_string(),
            ));
        }
        if !intent.is_succeeded() {
            return Err(ApiError::PaymentNotConfirmed(format!(
                "payment status is {}",
                intent.status
            )));
        }
        if !intent.currency.eq_ignore_ascii_case(&self.currency)
            || intent.amount != session.fee_in_cents()
        {
            warn!(
                "Payment {} is {} {}, session {} costs {} {}",
                reference,
                intent.amount,
                intent.currency,
                session.id,
                session.fee_in_cents(),
                self.currency
            );
            return Err(ApiError::PaymentNotConfirmed(
                "payment does not match the session fee".to_string(),
            ));
        }

        Ok(())
    }

    async fn reserve(
        &self,
        student: &Principal,
        session: &StudySession,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> ApiResult<Booking> {
        let booking = Booking {
            id: Uuid::new_v4(),
            session_id: session.id,
            student_id: student.id,
            student_email: student.email.clone(),
            student_name: student.name.clone(),
            tutor_name: session.tutor_name.clone(),
            tutor_email: session.tutor_email.clone(),
            session_title: session.title.clone(),
            class_start: session.class_start,
            class_end: session.class_end,
            fee_paid: if payment_reference.is_some() {
                session.registration_fee
            } else {
                0.0
            },
            payment_reference,
            booked_at: now,
        };

        match self
            .bookings
            .reserve_seat(&booking)
            .await
            .map_err(ApiError::transient)?
        {
            Reservation::Booked(booking) => {
                info!(
                    "Booking {}: {} took a seat in session {}",
                    booking.id, booking.student_email, booking.session_id
                );
                Ok(booking)
            }
            Reservation::Replayed(existing) => Self::replayed(student, session.id, existing),
            Reservation::Duplicate => Err(ApiError::DuplicateBooking),
            Reservation::Full => {
                info!("Session {} is full, rejected {}", session.id, student.email);
                Err(ApiError::CapacityExceeded)
            }
            Reservation::NotBookable => Err(ApiError::SessionNotBookable(
                "session is no longer approved".to_string(),
            )),
        }
    }

    /// A confirmation whose reference is already on a booking
    fn replayed(student: &Principal, session_id: Uuid, existing: Booking) -> ApiResult<Booking> {
        if existing.student_id == student.id && existing.session_id == session_id {
            info!("Replayed payment confirmation for booking {}", existing.id);
            Ok(existing)
        } else {
            warn!(
                "Payment reference of booking {} presented by {}",
                existing.id, student.email
            );
            Err(ApiError::PaymentNotConfirmed(
                "payment reference already used".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        payments::fake::FakeGateway,
        repositories::memory::{MemoryStore, open_session, user},
    };
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<FakeGateway>,
        service: BookingService,
        tutor: crate::models::user::User,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let service = BookingService::new(store.clone(), store.clone(), gateway.clone(), "usd");
        Fixture {
            store,
            gateway,
            service,
            tutor: user("tutor@example.com", Role::Tutor),
        }
    }

    fn student(n: usize) -> Principal {
        Principal::from(&user(&format!("student{}@example.com", n), Role::Student))
    }

    fn confirmation(session: &StudySession, intent: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            session_id: session.id,
            payment_intent_id: intent.to_string(),
        }
    }

    #[tokio::test]
    async fn test_free_booking_shows_up_as_upcoming() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 0.0, 3, now);
        f.store.add_session(session.clone());
        let alice = student(1);

        let booking = f.service.book_free(&alice, session.id, now).await.unwrap();

        assert_eq!(booking.fee_paid, 0.0);
        assert_eq!(booking.payment_reference, None);
        assert_eq!(f.store.session(session.id).unwrap().current_enrollment, 1);

        let booked = f
            .service
            .booked_sessions(&alice, &alice.email, now)
            .await
            .unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].booking.id, booking.id);
        assert_eq!(booked[0].progress, ClassProgress::Upcoming);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_seat_goes_to_exactly_one_student() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 0.0, 1, now);
        f.store.add_session(session.clone());
        let session_id = session.id;

        let handles: Vec<_> = (0..2)
            .map(|n| {
                let service = f.service.clone();
                let student = student(n);
                tokio::spawn(async move { service.book_free(&student, session_id, now).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(ApiError::CapacityExceeded)))
        );
        assert_eq!(f.store.session(session.id).unwrap().current_enrollment, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_enrollment_never_exceeds_capacity() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 0.0, 5, now);
        f.store.add_session(session.clone());
        let session_id = session.id;

        let handles: Vec<_> = (0..20)
            .map(|n| {
                let service = f.service.clone();
                let student = student(n);
                tokio::spawn(async move { service.book_free(&student, session_id, now).await })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                booked += 1;
            }
        }

        assert_eq!(booked, 5);
        assert_eq!(f.store.session(session.id).unwrap().current_enrollment, 5);
        assert_eq!(f.store.bookings().len(), 5);
    }

    #[tokio::test]
    async fn test_replayed_confirmation_books_once() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(session.clone());
        f.gateway.add(session.id, "pi_ok", 1500, "usd", "succeeded");
        let bob = student(1);

        let first = f
            .service
            .book_paid(&bob, &confirmation(&session, "pi_ok"), now)
            .await
            .unwrap();
        let second = f
            .service
            .book_paid(&bob, &confirmation(&session, "pi_ok"), now)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fee_paid, 15.0);
        assert_eq!(first.payment_reference.as_deref(), Some("pi_ok"));
        assert_eq!(f.store.bookings().len(), 1);
        assert_eq!(f.store.session(session.id).unwrap().current_enrollment, 1);
    }

    #[tokio::test]
    async fn test_replay_after_registration_closes_still_succeeds() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(session.clone());
        f.gateway.add(session.id, "pi_ok", 1500, "usd", "succeeded");
        let bob = student(1);

        let first = f
            .service
            .book_paid(&bob, &confirmation(&session, "pi_ok"), now)
            .await
            .unwrap();
        let later = session.registration_end + Duration::hours(1);
        let replay = f
            .service
            .book_paid(&bob, &confirmation(&session, "pi_ok"), later)
            .await
            .unwrap();

        assert_eq!(first.id, replay.id);
    }

    #[tokio::test]
    async fn test_reference_cannot_be_reused_by_another_student() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(session.clone());
        f.gateway.add(session.id, "pi_ok", 1500, "usd", "succeeded");

        f.service
            .book_paid(&student(1), &confirmation(&session, "pi_ok"), now)
            .await
            .unwrap();
        let err = f
            .service
            .book_paid(&student(2), &confirmation(&session, "pi_ok"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::PaymentNotConfirmed(_)));
        assert_eq!(f.store.bookings().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_or_mismatched_payment_is_rejected() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(session.clone());
        f.gateway.add(session.id, "pi_pending", 1500, "usd", "processing");
        f.gateway.add(session.id, "pi_short", 1000, "usd", "succeeded");
        f.gateway.add(session.id, "pi_eur", 1500, "eur", "succeeded");
        let bob = student(1);

        for intent in ["pi_pending", "pi_short", "pi_eur", "pi_missing"] {
            let err = f
                .service
                .book_paid(&bob, &confirmation(&session, intent), now)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ApiError::PaymentNotConfirmed(_)),
                "{} gave {:?}",
                intent,
                err
            );
        }
        assert!(f.store.bookings().is_empty());
        assert_eq!(f.store.session(session.id).unwrap().current_enrollment, 0);
    }

    #[tokio::test]
    async fn test_one_payment_books_one_session() {
        let f = fixture();
        let now = Utc::now();
        let first = open_session(&f.tutor, 15.0, 10, now);
        let second = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(first.clone());
        f.store.add_session(second.clone());
        f.gateway.add(first.id, "pi_abc", 1500, "usd", "succeeded");
        // A processor that resolves decorated ids to the plain intent
        f.gateway.alias("pi_abc_again", "pi_abc");
        let bob = student(1);

        f.service
            .book_paid(&bob, &confirmation(&first, "pi_abc"), now)
            .await
            .unwrap();

        let same_intent_other_session = f
            .service
            .book_paid(&bob, &confirmation(&second, "pi_abc"), now)
            .await
            .unwrap_err();
        assert!(matches!(same_intent_other_session, ApiError::PaymentNotConfirmed(_)));

        let aliased = f
            .service
            .book_paid(&bob, &confirmation(&second, "pi_abc_again"), now)
            .await
            .unwrap_err();
        assert!(matches!(aliased, ApiError::PaymentNotConfirmed(_)));

        for decorated in ["pi_abc#again", "pi_abc?x=1", "pi_abc/../pi_abc", " pi_abc x"] {
            let err = f
                .service
                .book_paid(&bob, &confirmation(&second, decorated), now)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ApiError::Validation(ref fields) if fields[0].field == "payment_intent_id"),
                "{} gave {:?}",
                decorated,
                err
            );
        }

        assert_eq!(f.store.bookings().len(), 1);
        assert_eq!(f.store.session(second.id).unwrap().current_enrollment, 0);
    }

    #[tokio::test]
    async fn test_payment_for_another_session_is_rejected() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 15.0, 10, now);
        f.store.add_session(session.clone());
        f.gateway.add(Uuid::new_v4(), "pi_elsewhere", 1500, "usd", "succeeded");

        let err = f
            .service
            .book_paid(&student(1), &confirmation(&session, "pi_elsewhere"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::PaymentNotConfirmed(_)));
        assert!(f.store.bookings().is_empty());
    }

    #[tokio::test]
    async fn test_free_and_paid_paths_do_not_mix() {
        let f = fixture();
        let now = Utc::now();
        let paid = open_session(&f.tutor, 15.0, 10, now);
        let free = open_session(&f.tutor, 0.0, 10, now);
        f.store.add_session(paid.clone());
        f.store.add_session(free.clone());
        f.gateway.add(paid.id, "pi_ok", 1500, "usd", "succeeded");

        assert!(matches!(
            f.service.book_free(&student(1), paid.id, now).await,
            Err(ApiError::PaymentNotConfirmed(_))
        ));
        assert!(matches!(
            f.service
                .book_paid(&student(1), &confirmation(&free, "pi_ok"), now)
                .await,
            Err(ApiError::SessionNotBookable(_))
        ));
    }

    #[tokio::test]
    async fn test_preconditions_fail_in_order() {
        let f = fixture();
        let now = Utc::now();
        let alice = student(1);

        let mut pending = open_session(&f.tutor, 0.0, 1, now);
        pending.status = SessionStatus::Pending;
        f.store.add_session(pending.clone());
        assert!(matches!(
            f.service.book_free(&alice, pending.id, now).await,
            Err(ApiError::SessionNotBookable(_))
        ));

        let open = open_session(&f.tutor, 0.0, 1, now);
        f.store.add_session(open.clone());
        let closed_at = open.registration_end + Duration::seconds(1);
        assert!(matches!(
            f.service.book_free(&alice, open.id, closed_at).await,
            Err(ApiError::SessionNotBookable(_))
        ));

        let tutor = Principal::from(&f.tutor);
        assert!(matches!(
            f.service.book_free(&tutor, open.id, now).await,
            Err(ApiError::Forbidden)
        ));

        f.service.book_free(&alice, open.id, now).await.unwrap();
        // Already booked and now also full: the duplicate is reported first
        assert!(matches!(
            f.service.book_free(&alice, open.id, now).await,
            Err(ApiError::DuplicateBooking)
        ));
        assert!(matches!(
            f.service.book_free(&student(2), open.id, now).await,
            Err(ApiError::CapacityExceeded)
        ));

        assert!(matches!(
            f.service.book_free(&alice, Uuid::new_v4(), now).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_registration_window_bounds_are_inclusive() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 0.0, 5, now);
        f.store.add_session(session.clone());

        f.service
            .book_free(&student(1), session.id, session.registration_start)
            .await
            .unwrap();
        f.service
            .book_free(&student(2), session.id, session.registration_end)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_payment_intent_amount_comes_from_session() {
        let f = fixture();
        let now = Utc::now();
        let session = open_session(&f.tutor, 12.5, 10, now);
        f.store.add_session(session.clone());

        let intent = f
            .service
            .create_payment_intent(&student(1), session.id, now)
            .await
            .unwrap();

        assert_eq!(intent.amount, 1250);
        assert_eq!(intent.currency, "usd");
        assert!(!intent.client_secret.is_empty());
    }

    #[tokio::test]
    async fn test_students_only_see_their_own_bookings() {
        let f = fixture();
        let alice = student(1);

        assert!(matches!(
            f.service
                .booked_sessions(&alice, "someone-else@example.com", Utc::now())
                .await,
            Err(ApiError::Forbidden)
        ));
    }
}
