//! In-memory user store for testing.

use super::{StoreError, UserStore};
use crate::models::user::UserRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store. A `failing` store errors on every operation, for
/// exercising the fail-closed paths.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    failing: bool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            failing: true,
        }
    }

    /// Seed a record, bypassing the trait.
    pub async fn insert(&self, record: UserRecord) {
        self.users.write().await.insert(record.id.clone(), record);
    }

    /// Snapshot a record for assertions.
    pub async fn record(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(user_id).cloned()
    }

    fn check_failing(&self) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError::ApiError("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check_failing()?;
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn create_user(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.check_failing()?;
        self.users
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn set_report_usage(
        &self,
        user_id: &str,
        report_count: i64,
        last_report_date: &str,
    ) -> Result<(), StoreError> {
        self.check_failing()?;

        let mut users = self.users.write().await;
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::ApiError(format!("no such user: {}", user_id)))?;

        record.report_count = report_count;
        record.last_report_date = Some(last_report_date.to_string());
        Ok(())
    }
}
