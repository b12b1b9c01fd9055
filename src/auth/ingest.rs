//! Signed ingest tokens
//!
//! An ingest token authorizes event-batch uploads for exactly one session
//! until it expires. It is stateless: nothing is stored server-side and the
//! only lifecycle end is `exp`.
//!
//! Wire layout, URL-safe base64 without padding:
//!
//! ```text
//! {"sid":"<session id>","exp":<unix seconds>} . <32-byte HMAC-SHA256>
//! ```
//!
//! The MAC is always the trailing 32 bytes, so `.` bytes inside the raw MAC
//! or the session id never affect framing.

use base64::{
    alphabet,
    engine::{general_purpose::URL_SAFE_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Separator between the payload and the MAC
const SEPARATOR: u8 = b'.';

/// HMAC-SHA256 output length
const MAC_LEN: usize = 32;

/// Decoder that accepts tokens with or without trailing `=`
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Caller-contract violations when issuing a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    #[error("ingest secret must not be empty")]
    EmptySecret,

    #[error("session id must not be empty")]
    EmptySessionId,

    #[error("ttl must be positive")]
    NonPositiveTtl,

    #[error("ttl of {0}s overflows the expiry timestamp")]
    TtlOverflow(u64),
}

/// Reasons a presented token is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed ingest token: {0}")]
    Malformed(String),

    #[error("invalid ingest token signature")]
    InvalidSignature,

    #[error("ingest token expired at {exp}")]
    Expired { exp: i64 },
}

/// Payload carried inside an ingest token
///
/// Field order is the canonical serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestClaims {
    /// Session the bearer may ingest into
    pub sid: String,
    /// Absolute expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// Current wall-clock time as Unix seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Issue a token for `session_id` valid for `ttl_seconds` from now
pub fn issue(secret: &[u8], session_id: &str, ttl_seconds: u64) -> Result<String, IssueError> {
    issue_at(secret, session_id, ttl_seconds, unix_now())
}

/// Issue a token as if the current time were `now`
pub fn issue_at(
    secret: &[u8],
    session_id: &str,
    ttl_seconds: u64,
    now: i64,
) -> Result<String, IssueError> {
    if secret.is_empty() {
        return Err(IssueError::EmptySecret);
    }
    if session_id.is_empty() {
        return Err(IssueError::EmptySessionId);
    }
    if ttl_seconds == 0 {
        return Err(IssueError::NonPositiveTtl);
    }

    let exp = i64::try_from(ttl_seconds)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(IssueError::TtlOverflow(ttl_seconds))?;

    let claims = IngestClaims {
        sid: session_id.to_string(),
        exp,
    };
    let body = canonical_bytes(&claims);

    let mut raw = Vec::with_capacity(body.len() + 1 + MAC_LEN);
    raw.extend_from_slice(&body);
    raw.push(SEPARATOR);
    raw.extend_from_slice(&sign(secret, &body));

    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Verify a token against the current time
pub fn verify(secret: &[u8], token: &str) -> Result<IngestClaims, VerifyError> {
    verify_at(secret, token, unix_now())
}

/// Verify a token as if the current time were `now`
pub fn verify_at(secret: &[u8], token: &str, now: i64) -> Result<IngestClaims, VerifyError> {
    let raw = URL_SAFE_LENIENT
        .decode(token)
        .map_err(|e| VerifyError::Malformed(e.to_string()))?;

    let (body, mac) = split_frame(&raw)?;

    let mut expected = new_mac(secret);
    expected.update(body);
    // verify_slice compares in constant time
    expected
        .verify_slice(mac)
        .map_err(|_| VerifyError::InvalidSignature)?;

    let claims: IngestClaims =
        serde_json::from_slice(body).map_err(|e| VerifyError::Malformed(e.to_string()))?;

    if claims.exp < now {
        return Err(VerifyError::Expired { exp: claims.exp });
    }

    Ok(claims)
}

/// Generate a random 32-byte secret, URL-safe base64 encoded
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn canonical_bytes(claims: &IngestClaims) -> Vec<u8> {
    serde_json::to_vec(claims).expect("serialize payload")
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size")
}

fn sign(secret: &[u8], body: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = new_mac(secret);
    mac.update(body);
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn split_frame(raw: &[u8]) -> Result<(&[u8], &[u8]), VerifyError> {
    if raw.len() < MAC_LEN + 1 {
        return Err(VerifyError::Malformed("token too short".to_string()));
    }

    let sep_at = raw.len() - MAC_LEN - 1;
    if raw[sep_at] != SEPARATOR {
        return Err(VerifyError::Malformed("missing separator".to_string()));
    }

    Ok((&raw[..sep_at], &raw[sep_at + 1..]))
}
