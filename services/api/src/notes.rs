//! Private student notes

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, FieldError},
    identity::Principal,
    models::note::{Note, NoteRequest},
    repositories::NoteStore,
};

pub fn validate_note(note: &NoteRequest) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if note.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    }
    if note.description.trim().is_empty() {
        errors.push(FieldError::new("description", "description is required"));
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn trimmed(note: NoteRequest) -> NoteRequest {
    NoteRequest {
        title: note.title.trim().to_string(),
        description: note.description.trim().to_string(),
    }
}

#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteStore>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }

    pub async fn list(&self, owner: &Principal, email: &str) -> ApiResult<Vec<Note>> {
        if !owner.email.eq_ignore_ascii_case(email.trim()) {
            return Err(ApiError::Forbidden);
        }
        self.notes
            .list_for_owner(&owner.email)
            .await
            .map_err(ApiError::transient)
    }

    pub async fn create(
        &self,
        owner: &Principal,
        request: NoteRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<Note> {
        validate_note(&request).map_err(ApiError::Validation)?;
        let request = trimmed(request);

        let note = Note {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            owner_email: owner.email.clone(),
            title: request.title,
            description: request.description,
            created_at: now,
            updated_at: now,
        };
        self.notes.insert(&note).await.map_err(ApiError::transient)?;
        Ok(note)
    }

    pub async fn update(&self, owner: &Principal, id: Uuid, request: NoteRequest) -> ApiResult<Note> {
        self.owned(owner, id).await?;
        validate_note(&request).map_err(ApiError::Validation)?;

        self.notes
            .update(id, &trimmed(request))
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Note"))
    }

    pub async fn delete(&self, owner: &Principal, id: Uuid) -> ApiResult<()> {
        self.owned(owner, id).await?;
        if self.notes.delete(id).await.map_err(ApiError::transient)? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Note"))
        }
    }

    async fn owned(&self, owner: &Principal, id: Uuid) -> ApiResult<Note> {
        let note = self
            .notes
            .find(id)
            .await
            .map_err(ApiError::transient)?
            .ok_or(ApiError::NotFound("Note"))?;

        if note.owner_id == owner.id {
            Ok(note)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}
