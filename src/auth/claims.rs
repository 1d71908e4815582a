//! Credential expiry inspection.
//!
//! Access credentials are JWT-shaped: three dot-separated base64url
//! segments, the middle one a JSON claims object carrying `exp` as seconds
//! since epoch (fractional allowed). Only the expiry instant is read here;
//! signature verification is the backend's job, and a forged expiry buys an
//! attacker nothing but a rejected request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("credential is not a three-part token")]
    MalformedToken,

    #[error("credential payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("credential claims are not valid JSON: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("credential carries no exp claim")]
    MissingExpiry,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<f64>,
}

/// Decode a credential's expiry instant (seconds since epoch).
/// Pure - no I/O, no clock access.
pub fn expires_at(credential: &str) -> Result<f64, DecodeError> {
    let mut parts = credential.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(DecodeError::MalformedToken),
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    let claims: Claims = serde_json::from_slice(&bytes)?;
    claims.exp.ok_or(DecodeError::MissingExpiry)
}

/// Current instant as fractional seconds since epoch.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// An expiry instant at or before now counts as expired.
pub fn is_expired(expires_at: f64) -> bool {
    expires_at <= now_secs()
}

/// Build a structurally valid credential with the given expiry.
/// The signature segment is garbage; only the payload matters to the
/// inspector.
#[cfg(test)]
pub fn forge_credential(exp: f64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.forged-signature")
}
