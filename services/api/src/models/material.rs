//! Material models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resource attached to a session by its tutor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub session_id: Uuid,
    pub session_title: String,
    pub tutor_id: Uuid,
    pub tutor_email: String,
    pub title: String,
    pub image_url: Option<String>,
    pub drive_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMaterialRequest {
    pub session_id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub drive_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialUpdate {
    pub title: String,
    pub image_url: Option<String>,
    pub drive_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialQuery {
    pub session_id: Uuid,
}

/// Response for material listing with pagination
#[derive(Debug, Clone, Serialize)]
pub struct MaterialPage {
    pub items: Vec<Material>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}
