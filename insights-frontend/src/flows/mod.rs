//! Prompt flows: schema-validated wrappers around model calls.
//!
//! Every flow has the same shape: validate the input, substitute fields
//! into a fixed prompt, call the model with the image inline and a JSON
//! output schema, then parse the reply into the flow's output type.
//! Malformed input never reaches the model.

pub mod generate_report;
pub mod summarize_report;
pub mod validate_xray;

use crate::services::genai::{ProviderError, ProviderResponse};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Invalid flow input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

/// Parse the model's structured JSON reply into the flow output type.
pub(crate) fn parse_output<T: DeserializeOwned>(response: ProviderResponse) -> Result<T, FlowError> {
    let text = response
        .text
        .ok_or_else(|| FlowError::MalformedOutput("empty model response".to_string()))?;

    serde_json::from_str(&text).map_err(|e| FlowError::MalformedOutput(e.to_string()))
}
