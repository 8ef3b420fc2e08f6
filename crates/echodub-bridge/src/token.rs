use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 30;

/// Decode the claims section of a JWT without verifying the signature.
/// Verification is the relay's job; locally we only need `exp`.
pub fn decode_claims(token: &str) -> Option<serde_json::Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether a bearer token is expired (or will be within `skew_secs`).
/// Tokens without a parseable `exp` claim are treated as still valid, the
/// relay rejects them authoritatively if not.
pub fn is_expired(token: &str, skew_secs: i64) -> bool {
    let Some(claims) = decode_claims(token) else {
        return false;
    };
    let Some(exp) = claims.get("exp").and_then(|v| v.as_i64()) else {
        return false;
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    now >= exp - skew_secs
}
