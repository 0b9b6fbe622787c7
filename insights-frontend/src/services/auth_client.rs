//! Identity provider client (Identity Toolkit wire shape).
//!
//! Email/password accounts, credential sign-in, and verification email
//! dispatch. The provider owns credentials and email delivery; this
//! client only exchanges them for tokens.

use crate::config::IdentitySettings;
use insight_core::observability::TracedClientExt;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("This email is already registered.")]
    EmailExists,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("The password is too weak.")]
    WeakPassword,

    #[error("Identity provider error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),
}

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Tokens and identity returned by a successful credential exchange.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTokens {
    pub id_token: String,
    pub local_id: String,
    pub email: String,
    /// Set on federated exchanges, absent on password ones.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub struct AuthClient {
    client: Client,
    settings: IdentitySettings,
}

impl AuthClient {
    pub fn new(settings: IdentitySettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.url
    }

    /// Send a POST to an accounts endpoint with trace context propagation.
    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}/accounts:{}", self.settings.url, method);

        self.client
            .traced_post(&url)
            .query(&[("key", self.settings.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to {}: {}", url, e);
                AuthError::Network(e.to_string())
            })
    }

    async fn exchange(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<IdentityTokens, AuthError> {
        let response = self.call(method, body).await?;

        if response.status().is_success() {
            response
                .json::<IdentityTokens>()
                .await
                .map_err(|e| AuthError::Api(format!("Malformed token response: {}", e)))
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Create an email/password account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityTokens, AuthError> {
        self.exchange(
            "signUp",
            serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Exchange email/password credentials for tokens.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityTokens, AuthError> {
        self.exchange(
            "signInWithPassword",
            serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Exchange a federated provider credential for tokens.
    pub async fn sign_in_with_idp(
        &self,
        provider_id: &str,
        provider_id_token: &str,
        request_uri: &str,
    ) -> Result<IdentityTokens, AuthError> {
        self.exchange(
            "signInWithIdp",
            serde_json::json!({
                "postBody": format!("id_token={}&providerId={}", provider_id_token, provider_id),
                "requestUri": request_uri,
                "returnSecureToken": true,
                "returnIdpCredential": true,
            }),
        )
        .await
    }

    /// Exchange a Google authorization code for the Google ID token that
    /// `sign_in_with_idp` consumes.
    pub async fn exchange_google_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        #[derive(Deserialize)]
        struct GoogleTokenResponse {
            id_token: String,
        }

        let response = self
            .client
            .traced_post(GOOGLE_TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach Google token endpoint: {}", e);
                AuthError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(format!(
                "Code exchange failed with {}: {}",
                status, body
            )));
        }

        let tokens: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Api(format!("Malformed token response: {}", e)))?;

        Ok(tokens.id_token)
    }

    /// Ask the provider to send the verification email for a fresh account.
    pub async fn send_verification_email(&self, id_token: &str) -> Result<(), AuthError> {
        let response = self
            .call(
                "sendOobCode",
                serde_json::json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": id_token,
                }),
            )
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

/// Map the provider's error body to a typed error.
async fn error_from_response(response: reqwest::Response) -> AuthError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let status = response.status();
    let code = response
        .json::<ErrorBody>()
        .await
        .map(|b| b.error.message)
        .unwrap_or_else(|_| status.to_string());

    match code.as_str() {
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "INVALID_EMAIL" => AuthError::InvalidEmail,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        other => AuthError::Api(other.to_string()),
    }
}
