use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// The per-user document held in the remote store.
///
/// `report_count` is only meaningful relative to `last_report_date`: a
/// stale date means the count is treated as zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub registration_date: String,
    #[serde(default)]
    pub report_count: i64,
    #[serde(default)]
    pub last_report_date: Option<String>,
}

impl UserRecord {
    pub fn new(id: String, email: String, full_name: String) -> Self {
        Self {
            id,
            email,
            full_name,
            registration_date: Utc::now().to_rfc3339(),
            report_count: 0,
            last_report_date: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub email: String,
    pub full_name: Option<String>,
}

impl UserProfile {
    pub fn name(&self) -> String {
        match &self.full_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.email.split('@').next().unwrap_or("User").to_string(),
        }
    }

    pub fn initials(&self) -> String {
        // Counted in chars, not bytes; names are arbitrary Unicode.
        let initials: String = self.name().chars().take(2).collect();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials.to_uppercase()
        }
    }
}

/// Authenticated user context extracted from session
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract session from request extensions
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        let id_token: Option<String> = session.get("id_token").await.unwrap_or(None);
        let user_id: Option<String> = session.get("user_id").await.unwrap_or(None);
        let email: Option<String> = session.get("email").await.unwrap_or(None);

        match (id_token, user_id, email) {
            (Some(token), Some(uid), Some(email_val)) => Ok(AuthUser {
                user_id: uid,
                email: email_val,
                id_token: token,
            }),
            _ => {
                // Redirect to login if not authenticated
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}
