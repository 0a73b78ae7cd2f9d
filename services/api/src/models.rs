//! API models for request and response payloads
//!
//! Payloads use camelCase field names, matching the browser client.

use serde::Serialize;

pub mod booking;
pub mod material;
pub mod note;
pub mod review;
pub mod stats;
pub mod study_session;
pub mod user;

/// Result of an action that needs an explicit "are you sure?" step
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The action was applied
    Done(T),
    /// Nothing was changed; repeat the request with confirmation
    ConfirmationRequired { message: String },
}

/// Wire shape of [`Outcome::ConfirmationRequired`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResponse {
    pub requires_confirmation: bool,
    pub message: String,
}

/// Pagination query parameters
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PageQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Number of items per page
    pub limit: Option<u32>,
}

impl PageQuery {
    /// Page number clamped to at least 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to 1..=100
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}
