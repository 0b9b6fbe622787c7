//! Remote user document store abstraction.
//!
//! User records live in an external document database reached over its
//! public REST API. The trait seam mirrors the model-provider seam so the
//! quota checker and handlers can run against an in-memory store in tests.

pub mod firestore;
pub mod memory;

use crate::models::user::UserRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user record; `Ok(None)` when the document does not exist.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Create (or overwrite) the full user record. Called once at signup.
    async fn create_user(&self, record: &UserRecord) -> Result<(), StoreError>;

    /// Merge-write the daily usage fields only, leaving the rest of the
    /// record untouched.
    async fn set_report_usage(
        &self,
        user_id: &str,
        report_count: i64,
        last_report_date: &str,
    ) -> Result<(), StoreError>;
}
