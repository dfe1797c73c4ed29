//! Best-effort inspection of access tokens.
//!
//! Tokens are opaque to the store. The guard peeks at JWT-shaped tokens only to
//! notice an `exp` that has long passed, or a payload that no longer decodes.
//! Signatures are not checked; the backend remains the authority.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value as JsonValue;

/// The claims the guard cares about. Everything else in the payload, whatever
/// its type, is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessClaims {
    /// `exp` in whole seconds; fractional NumericDates are truncated
    pub exp: Option<i64>,
}

impl AccessClaims {
    fn from_payload(payload: &serde_json::Map<String, JsonValue>) -> Self {
        let exp = payload
            .get("exp")
            .and_then(JsonValue::as_f64)
            .filter(|exp| exp.is_finite())
            .map(|exp| exp.floor() as i64);
        Self { exp }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Expired by more than `tolerance` at `now`. Tokens without `exp` never expire here.
    pub fn expired_beyond(&self, now: DateTime<Utc>, tolerance: Duration) -> bool {
        match self.expires_at() {
            Some(expiry) => now > expiry + tolerance,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenShape {
    /// Not a JWT; nothing to inspect
    Opaque,
    Jwt(AccessClaims),
    /// Looks like a JWT but the payload does not decode
    Malformed,
}

fn decode_segment(segment: &str) -> Option<JsonValue> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Classify an access token.
///
/// A token counts as a JWT when it has three dot-separated segments and the
/// first decodes to a JSON object. It is malformed only when the payload is
/// not a JSON object; claim types are never checked.
pub fn inspect(token: &str) -> TokenShape {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return TokenShape::Opaque;
    }
    match decode_segment(segments[0]) {
        Some(JsonValue::Object(_)) => {}
        _ => return TokenShape::Opaque,
    }
    match decode_segment(segments[1]) {
        Some(JsonValue::Object(payload)) => TokenShape::Jwt(AccessClaims::from_payload(&payload)),
        _ => TokenShape::Malformed,
    }
}

#[cfg(test)]
pub(crate) fn encode_test_jwt(payload: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}
