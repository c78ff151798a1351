//! Webhook HMAC signing and verification utilities.
//!
//! The render provider signs every callback delivery with HMAC-SHA256 over
//! the string `{delivery_id}.{timestamp}.{raw_body}`, where `timestamp` is
//! a UTC Unix timestamp in seconds. This module lives in `core` (zero
//! internal deps) so it can be used by both the API layer and any future
//! worker or CLI tooling.

use hmac::{Hmac, Mac};
use sha2::Sha256;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default freshness window for webhook timestamps, in seconds.
///
/// Deliveries whose timestamp is further than this from the receiver's
/// clock (in either direction, to tolerate skew) are rejected as replays.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a webhook delivery fails verification.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The signature header was not valid hex or had the wrong length.
    #[error("Malformed signature")]
    Malformed,

    /// The signature did not match the payload.
    #[error("Signature mismatch")]
    Mismatch,

    /// The timestamp header was not a valid integer.
    #[error("Malformed timestamp")]
    BadTimestamp,

    /// The timestamp is outside the freshness window.
    #[error("Stale timestamp: {age_secs}s outside the {window_secs}s window")]
    Stale { age_secs: i64, window_secs: i64 },
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical signed string for a delivery.
fn signed_payload(delivery_id: &str, timestamp: i64, body: &str) -> String {
    format!("{delivery_id}.{timestamp}.{body}")
}

/// Compute the hex-encoded HMAC-SHA256 signature for a webhook delivery.
///
/// Used by tests and by any outbound signing (the provider performs the
/// same computation on its side).
pub fn compute_signature(secret: &str, delivery_id: &str, timestamp: i64, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload(delivery_id, timestamp, body).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook delivery signature and timestamp.
///
/// `now_secs` is the receiver's current Unix time; callers pass
/// `chrono::Utc::now().timestamp()` in production and a fixed value in
/// tests. The timestamp check runs first so an attacker cannot probe
/// signatures with arbitrarily old payloads.
///
/// The signature comparison is constant-time (`Mac::verify_slice`).
pub fn verify_signature(
    secret: &str,
    delivery_id: &str,
    timestamp_header: &str,
    body: &str,
    signature_hex: &str,
    now_secs: i64,
    window_secs: i64,
) -> Result<(), SignatureError> {
    let timestamp: i64 = timestamp_header
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;

    let age_secs = (now_secs - timestamp).abs();
    if age_secs > window_secs {
        return Err(SignatureError::Stale {
            age_secs,
            window_secs,
        });
    }

    let signature = hex::decode(signature_hex).ok_or(SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload(delivery_id, timestamp, body).as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::Mismatch)
}

// ---------------------------------------------------------------------------
// hex encoding helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string into bytes. Returns `None` on odd length or
    /// non-hex characters.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
