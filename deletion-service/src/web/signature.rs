//! Facebook signed request verification.
//!
//! Facebook signs data deletion callbacks as `<signature>.<payload>`, where both
//! segments are base64url-encoded and the signature is an HMAC-SHA256 of the
//! *encoded* payload segment keyed by the app secret.
//! Reference: https://developers.facebook.com/docs/development/create-an-app/app-dashboard/data-deletion-callback

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// The only algorithm Facebook uses for signed requests.
pub const SIGNED_REQUEST_ALGORITHM: &str = "HMAC-SHA256";

/// Base64url engine that accepts segments with or without `=` padding.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reasons a signed request is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Malformed signed_request: {0}")]
    MalformedInput(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Decoded payload of a signed request.
///
/// Unknown fields are kept in `extra` so the payload survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SignedRequestPayload {
    /// The user id, if present and non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Verify a Facebook signed request and return its decoded payload.
///
/// Structure and payload decoding are checked first, so malformed input never
/// reaches the HMAC computation. Signature problems of any kind (undecodable,
/// wrong length, wrong content) are reported uniformly as `InvalidSignature`.
pub fn verify_signed_request(
    signed_request: &str,
    secret: &[u8],
) -> Result<SignedRequestPayload, VerificationError> {
    let (encoded_sig, encoded_payload) = split_signed_request(signed_request)?;

    let payload_bytes = BASE64_URL.decode(encoded_payload).map_err(|e| {
        warn!(error = %e, "signed_request_payload_not_base64");
        VerificationError::MalformedInput("payload is not base64url".to_string())
    })?;

    let payload: SignedRequestPayload = serde_json::from_slice(&payload_bytes).map_err(|e| {
        warn!(error = %e, "signed_request_payload_not_json");
        VerificationError::MalformedInput("payload is not a JSON object".to_string())
    })?;

    // An undecodable signature can never match, treat it like any other mismatch
    let provided_sig = BASE64_URL.decode(encoded_sig).unwrap_or_default();

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| VerificationError::InvalidSignature)?;
    mac.update(encoded_payload.as_bytes());
    let expected_sig = mac.finalize().into_bytes();

    if !constant_time_compare(&expected_sig, &provided_sig) {
        warn!(
            expected_length = expected_sig.len(),
            actual_length = provided_sig.len(),
            "signed_request_signature_mismatch"
        );
        return Err(VerificationError::InvalidSignature);
    }

    if let Some(algorithm) = payload.algorithm.as_deref() {
        if !algorithm.eq_ignore_ascii_case(SIGNED_REQUEST_ALGORITHM) {
            warn!(algorithm = %algorithm, "signed_request_unsupported_algorithm");
            return Err(VerificationError::UnsupportedAlgorithm(algorithm.to_string()));
        }
    }

    Ok(payload)
}

/// Build a signed request for `payload` the way Facebook does.
///
/// Used by tests and by tooling that replays callbacks against a local server.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> String {
    let encoded_payload = BASE64_URL.encode(payload);

    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(encoded_payload.as_bytes());
    let encoded_sig = BASE64_URL.encode(mac.finalize().into_bytes());

    format!("{}.{}", encoded_sig, encoded_payload)
}

/// Split into `(signature, payload)`, requiring exactly one `.` and two non-empty segments.
fn split_signed_request(signed_request: &str) -> Result<(&str, &str), VerificationError> {
    let (sig, payload) = signed_request
        .split_once('.')
        .ok_or_else(|| VerificationError::MalformedInput("missing '.' separator".to_string()))?;

    if sig.is_empty() || payload.is_empty() {
        return Err(VerificationError::MalformedInput("empty segment".to_string()));
    }

    if payload.contains('.') {
        return Err(VerificationError::MalformedInput(
            "more than one '.' separator".to_string(),
        ));
    }

    Ok((sig, payload))
}

/// Constant-time comparison of a digest against untrusted bytes.
///
/// Runs over every byte of `expected` whatever the length or content of
/// `provided`, so neither a length mismatch nor a differing prefix exits early.
fn constant_time_compare(expected: &[u8], provided: &[u8]) -> bool {
    let mut result = u8::from(expected.len() != provided.len());
    for (i, x) in expected.iter().enumerate() {
        let y = provided.get(i).copied().unwrap_or(!*x);
        result |= x ^ y;
    }
    result == 0
}
