//! Generative model abstraction and implementations.
//!
//! A trait-based seam over the hosted text model so handlers and flows can
//! be exercised against a mock without network access.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for model calls.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result of a model call.
#[derive(Debug)]
pub struct ProviderResponse {
    /// Text content (plain or structured JSON, per request).
    pub text: Option<String>,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
}

/// Generation parameters.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,

    /// JSON schema the model output must conform to. When set, the
    /// provider requests a structured JSON response.
    pub output_schema: Option<serde_json::Value>,
}

/// An image passed to the model inline as base64.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl From<&crate::utils::data_uri::DataUri> for InlineImage {
    fn from(uri: &crate::utils::data_uri::DataUri) -> Self {
        Self {
            mime_type: uri.mime_type().to_string(),
            data: uri.payload().to_string(),
        }
    }
}

/// Trait for text/JSON generation models.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate a response for the prompt, with an optional inline image.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&InlineImage>,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
