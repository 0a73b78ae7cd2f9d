//! User models

use chrono::{DateTime, Utc};
use common::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application user as seen by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Tutor card shown on the public tutor directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicTutor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub bio: Option<String>,
}

impl From<User> for PublicTutor {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.display_name.unwrap_or_else(|| user.email.clone()),
            email: user.email,
            photo_url: user.photo_url,
            bio: user.bio,
        }
    }
}

/// Profile fields a user may change on their own record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(alias = "name")]
    pub display_name: Option<String>,
    #[serde(alias = "photoURL")]
    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

/// Admin role change payload
#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

/// Query parameters for the user search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
}

/// Response for `GET /api/user`
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub exists: bool,
    pub user: User,
}
