use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    /// Subject: the user's stable identifier at the identity provider.
    pub sub: String,
    pub email: Option<String>,
    pub exp: i64,
}

/// Decode ID-token claims without validation
///
/// The token arrives directly from the identity provider over TLS in
/// response to our own credential exchange, so we trust it and only need
/// the subject/email for session storage.
///
/// Note: This does NOT validate the signature.
pub fn decode_id_token_claims(token: &str) -> Result<IdTokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    // Decode the payload (second part)
    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: IdTokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}
