//! Self-describing base64 image payloads (`data:<mime>;base64,<data>`).
//!
//! Uploaded files are converted to this form once at the submission
//! boundary; flows and the model client consume it from there.

use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use thiserror::Error;
use validator::ValidationError;

/// Image types accepted for upload.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Error, PartialEq)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,

    #[error("missing MIME type")]
    MissingMimeType,

    #[error("only base64-encoded data URIs are supported")]
    NotBase64,

    #[error("invalid base64 payload")]
    InvalidPayload,
}

/// An image held inline as a MIME type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Encode raw bytes into a data URI.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:<mime>;base64,<data>` string.
    pub fn parse(input: &str) -> Result<Self, DataUriError> {
        let rest = input.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;

        let (header, data) = rest.split_once(',').ok_or(DataUriError::NotBase64)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUriError::NotBase64)?;

        if mime_type.is_empty() {
            return Err(DataUriError::MissingMimeType);
        }

        // Reject garbage payloads before they reach a remote call.
        general_purpose::STANDARD
            .decode(data)
            .map_err(|_| DataUriError::InvalidPayload)?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64-encoded payload without the scheme header.
    pub fn payload(&self) -> &str {
        &self.data
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Whether the MIME type is on the upload allow-list.
pub fn is_allowed_image_type(mime_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&mime_type)
}

/// Flow-boundary check: the field must be a well-formed data URI carrying
/// an allowed image type.
pub fn validate_image_data_uri(value: &str) -> Result<(), ValidationError> {
    let parsed = DataUri::parse(value).map_err(|_| ValidationError::new("invalid_data_uri"))?;

    if !is_allowed_image_type(parsed.mime_type()) {
        return Err(ValidationError::new("unsupported_image_type"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let uri = DataUri::from_bytes("image/png", b"fake png bytes");
        let rendered = uri.to_string();
        assert!(rendered.starts_with("data:image/png;base64,"));

        let parsed = DataUri::parse(&rendered).unwrap();
        assert_eq!(parsed, uri);
    }

    #[test]
    fn rejects_non_data_uri() {
        assert_eq!(
            DataUri::parse("https://example.com/xray.png"),
            Err(DataUriError::MissingScheme)
        );
    }

    #[test]
    fn rejects_missing_base64_marker() {
        assert_eq!(
            DataUri::parse("data:image/png,plaintext"),
            Err(DataUriError::NotBase64)
        );
    }

    #[test]
    fn rejects_invalid_payload() {
        assert_eq!(
            DataUri::parse("data:image/png;base64,@@not-base64@@"),
            Err(DataUriError::InvalidPayload)
        );
    }

    #[test]
    fn allow_list_covers_expected_types() {
        assert!(is_allowed_image_type("image/jpeg"));
        assert!(is_allowed_image_type("image/png"));
        assert!(is_allowed_image_type("image/webp"));
        assert!(!is_allowed_image_type("image/gif"));
        assert!(!is_allowed_image_type("application/pdf"));
    }

    #[test]
    fn validator_rejects_disallowed_type() {
        let uri = DataUri::from_bytes("image/gif", b"gif").to_string();
        assert!(validate_image_data_uri(&uri).is_err());

        let uri = DataUri::from_bytes("image/webp", b"webp").to_string();
        assert!(validate_image_data_uri(&uri).is_ok());
    }
}
