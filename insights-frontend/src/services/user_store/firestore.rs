//! Firestore-backed user store.
//!
//! Documents live under `users/{uid}` and use the REST typed-value
//! encoding. Merge writes go through `PATCH` with `updateMask.fieldPaths`
//! so unrelated fields survive a usage update.

use super::{StoreError, UserStore};
use crate::config::UserStoreSettings;
use crate::models::user::UserRecord;
use async_trait::async_trait;
use insight_core::observability::TracedClientExt;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub struct FirestoreUserStore {
    client: Client,
    settings: UserStoreSettings,
}

impl FirestoreUserStore {
    pub fn new(settings: UserStoreSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    fn document_url(&self, user_id: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/users/{}",
            self.settings.url, self.settings.project_id, user_id
        )
    }

    fn key(&self) -> String {
        self.settings.api_key.expose_secret().clone()
    }
}

#[async_trait]
impl UserStore for FirestoreUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let url = self.document_url(user_id);

        let response = self
            .client
            .traced_get(&url)
            .query(&[("key", self.key())])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch user document {}: {}", user_id, e);
                StoreError::NetworkError(e.to_string())
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError(format!(
                "Fetch failed with {}: {}",
                status, body
            )));
        }

        let document: FirestoreDocument = response
            .json()
            .await
            .map_err(|e| StoreError::MalformedDocument(e.to_string()))?;

        record_from_fields(&document.fields).map(Some)
    }

    async fn create_user(&self, record: &UserRecord) -> Result<(), StoreError> {
        let url = self.document_url(&record.id);
        let body = FirestoreDocument {
            fields: fields_from_record(record),
        };

        let response = self
            .client
            .traced_patch(&url)
            .query(&[("key", self.key())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to write user document {}: {}", record.id, e);
                StoreError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError(format!(
                "Create failed with {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn set_report_usage(
        &self,
        user_id: &str,
        report_count: i64,
        last_report_date: &str,
    ) -> Result<(), StoreError> {
        let url = self.document_url(user_id);

        let mut fields = BTreeMap::new();
        fields.insert("reportCount".to_string(), Value::integer(report_count));
        fields.insert(
            "lastReportDate".to_string(),
            Value::string(last_report_date),
        );
        let body = FirestoreDocument { fields };

        let response = self
            .client
            .traced_patch(&url)
            .query(&[
                ("updateMask.fieldPaths", "reportCount".to_string()),
                ("updateMask.fieldPaths", "lastReportDate".to_string()),
                ("key", self.key()),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to update usage for {}: {}", user_id, e);
                StoreError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError(format!(
                "Usage update failed with {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Firestore REST document encoding
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

/// Typed Firestore value. Only the variants the user record uses.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    /// Firestore transports 64-bit integers as decimal strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    integer_value: Option<String>,
}

impl Value {
    fn string(value: &str) -> Self {
        Self {
            string_value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn integer(value: i64) -> Self {
        Self {
            integer_value: Some(value.to_string()),
            ..Default::default()
        }
    }
}

fn fields_from_record(record: &UserRecord) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), Value::string(&record.id));
    fields.insert("email".to_string(), Value::string(&record.email));
    fields.insert("fullName".to_string(), Value::string(&record.full_name));
    fields.insert(
        "registrationDate".to_string(),
        Value::string(&record.registration_date),
    );
    fields.insert(
        "reportCount".to_string(),
        Value::integer(record.report_count),
    );
    if let Some(date) = &record.last_report_date {
        fields.insert("lastReportDate".to_string(), Value::string(date));
    }
    fields
}

fn record_from_fields(fields: &BTreeMap<String, Value>) -> Result<UserRecord, StoreError> {
    let string_field = |name: &str| -> Result<String, StoreError> {
        fields
            .get(name)
            .and_then(|v| v.string_value.clone())
            .ok_or_else(|| StoreError::MalformedDocument(format!("missing field {}", name)))
    };

    // Defensive: a missing or non-integer count reads as zero.
    let report_count = fields
        .get("reportCount")
        .and_then(|v| v.integer_value.as_deref())
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    let last_report_date = fields
        .get("lastReportDate")
        .and_then(|v| v.string_value.clone());

    Ok(UserRecord {
        id: string_field("id")?,
        email: string_field("email")?,
        full_name: string_field("fullName").unwrap_or_default(),
        registration_date: string_field("registrationDate").unwrap_or_default(),
        report_count,
        last_report_date,
    })
}
