//! Study materials attached to sessions

use chrono::{DateTime, Utc};
use common::Role;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, FieldError},
    identity::Principal,
    models::{
        PageQuery,
        material::{Material, MaterialPage, MaterialUpdate, NewMaterialRequest},
        study_session::SessionStatus,
    },
    repositories::{BookingStore, MaterialStore, SessionStore},
};

fn is_web_url(value: &str) -> bool {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = URL_REGEX.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("Failed to compile url regex")
    });
    regex.is_match(value)
}

/// Title required; at least one of image and link, each an http(s) URL
pub fn validate_material(
    title: &str,
    image_url: Option<&str>,
    drive_link: Option<&str>,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    }

    let image_url = image_url.map(str::trim).filter(|v| !v.is_empty());
    let drive_link = drive_link.map(str::trim).filter(|v| !v.is_empty());

    if image_url.is_none() && drive_link.is_none() {
        errors.push(FieldError::new(
            "image_url/drive_link",
            "an image or a document link is required",
        ));
    }
    if image_url.is_some_and(|url| !is_web_url(url)) {
        errors.push(FieldError::new("image_url", "must be an http(s) URL"));
    }
    if drive_link.is_some_and(|url| !is_web_url(url)) {
        errors.push(FieldError::new("drive_link", "must be an http(s) URL"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct MaterialService {
    materials: Arc<dyn MaterialStore>,
    sessions: Arc<dyn SessionStore>,
    bookings: Arc<dyn BookingStore>,
}

impl MaterialService {
    pub fn new(
        materials: Arc<dyn MaterialStore>,
        sessions: Arc<dyn SessionStore>,
        bookings: Arc<dyn BookingStore>,
    ) -> Self {
        Self {
            materials,
            sessions,
            bookings,
        }
    }

    /// Attach a material to one of the tutor's approved sessions
    pub async fn create(
        &self,
        tutor: &Principal,
        request: NewMaterialRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<Material> {
        if !tutor.is(Role::Tutor) {
            return Err(ApiError::Forbidden);
        }

        let session = self
            .sessions
            .find(request.session_id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Session"))?;
        if session.tutor_id != tutor.id {
            return Err(ApiError::Forbidden);
        }
        if session.status != SessionStatus::Approved {
            return Err(ApiError::invalid(
                "session_id",
                "materials can only be added to approved sessions",
            ));
        }

        validate_material(
            &request.title,
            request.image_url.as_deref(),
            request.drive_link.as_deref(),
        )
        .map_err(ApiError::Validation)?;

        let material = Material {
            id: Uuid::new_v4(),
            session_id: session.id,
            session_title: session.title,
            tutor_id: tutor.id,
            tutor_email: tutor.email.clone(),
            title: request.title.trim().to_string(),
            image_url: clean(&request.image_url),
            drive_link: clean(&request.drive_link),
            created_at: now,
            updated_at: now,
        };
        self.materials
            .insert(&material)
            .await
            .map_err(ApiError::transient)?;

        info!("Material {} added to session {}", material.id, material.session_id);
        Ok(material)
    }

    pub async fn list_for_tutor(&self, tutor: &Principal) -> ApiResult<Vec<Material>> {
        self.materials
            .list_for_tutor(tutor.id)
            .await
            .map_err(ApiError::transient)
    }

    /// Materials of a session the student has booked
    pub async fn list_for_student(
        &self,
        student: &Principal,
        session_id: Uuid,
    ) -> ApiResult<Vec<Material>> {
        let booked = self
            .bookings
            .find_for_student(session_id, &student.email)
            .await
            .map_err(ApiError::transient)?;
        if booked.is_none() {
            return Err(ApiError::Forbidden);
        }

        self.materials
            .list_for_session(session_id)
            .await
            .map_err(ApiError::transient)
    }

    pub async fn list_all(&self, page: &PageQuery) -> ApiResult<MaterialPage> {
        let (items, total) = self
            .materials
            .list_page(i64::from(page.limit()), page.offset())
            .await
            .map_err(ApiError::transient)?;

        Ok(MaterialPage {
            items,
            page: page.page(),
            limit: page.limit(),
            total,
        })
    }

    /// Owning tutor or any admin
    pub async fn update(
        &self,
        actor: &Principal,
        id: Uuid,
        update: MaterialUpdate,
    ) -> ApiResult<Material> {
        self.authorize(actor, id).await?;
        validate_material(
            &update.title,
            update.image_url.as_deref(),
            update.drive_link.as_deref(),
        )
        .map_err(ApiError::Validation)?;

        let update = MaterialUpdate {
            title: update.title.trim().to_string(),
            image_url: clean(&update.image_url),
            drive_link: clean(&update.drive_link),
        };
        self.materials
            .update(id, &update)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Material"))
    }

    /// Owning tutor or any admin
    pub async fn delete(&self, actor: &Principal, id: Uuid) -> ApiResult<()> {
        self.authorize(actor, id).await?;

        if self.materials.delete(id).await.map_err(ApiError::transient)? {
            info!("Material {} deleted by {}", id, actor.email);
            Ok(())
        } else {
            Err(ApiError::NotFound("Material"))
        }
    }

    async fn authorize(&self, actor: &Principal, id: Uuid) -> ApiResult<Material> {
        let material = self
            .materials
            .find(id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Material"))?;

        let allowed = actor.is(Role::Admin) || (actor.is(Role::Tutor) && material.tutor_id == actor.id);
        if allowed {
            Ok(material)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}
