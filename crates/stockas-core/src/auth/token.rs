//! Client-side inspection of access tokens.
//!
//! The `exp` claim is read without verifying the signature. It is used only to
//! schedule refreshes; authorization decisions stay with the server.
//! Every decode failure counts as invalid and near expiry.

use std::time::Duration;

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Refresh proactively when less than this much lifetime remains.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch
    pub exp: f64,
    #[serde(default)]
    sub: Option<Value>,
}

impl TokenClaims {
    pub fn expires_at_ms(&self) -> f64 {
        self.exp * 1000.0
    }

    /// Subject identifier; numeric subjects are rendered as strings
    pub fn subject(&self) -> Option<String> {
        match self.sub.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    // Accept both alphabets, with or without padding
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}

pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, Utc::now())
}

pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> bool {
    decode_claims(token)
        .map(|claims| claims.expires_at_ms() > now.timestamp_millis() as f64)
        .unwrap_or(false)
}

pub fn is_near_expiry(token: &str, threshold: Duration) -> bool {
    is_near_expiry_at(token, threshold, Utc::now())
}

pub fn is_near_expiry_at(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Some(claims) => {
            let remaining_ms = claims.expires_at_ms() - now.timestamp_millis() as f64;
            remaining_ms < threshold.as_millis() as f64
        }
        None => true,
    }
}

/// Time left until `exp`; negative once expired, `None` if undecodable or
/// outside the range a duration can hold.
pub fn time_until_expiry(token: &str) -> Option<chrono::Duration> {
    time_until_expiry_at(token, Utc::now())
}

pub fn time_until_expiry_at(token: &str, now: DateTime<Utc>) -> Option<chrono::Duration> {
    let claims = decode_claims(token)?;
    let remaining = claims.expires_at_ms() - now.timestamp_millis() as f64;
    if !remaining.is_finite() || remaining.abs() >= i64::MAX as f64 {
        return None;
    }
    chrono::Duration::try_milliseconds(remaining as i64)
}

pub fn subject(token: &str) -> Option<String> {
    decode_claims(token)?.subject()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn make_token(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode("fake-signature");
        format!("{}.{}.{}", header, payload, signature)
    }

    fn token_expiring_in(secs: i64) -> String {
        let exp = Utc::now().timestamp() + secs;
        make_token(&format!(r#"{{"exp":{},"sub":"user-1"}}"#, exp))
    }

    #[test]
    fn test_valid_token() {
        let token = token_expiring_in(3600);
        assert!(is_valid(&token));
        assert!(!is_near_expiry(&token, DEFAULT_REFRESH_THRESHOLD));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let token = token_expiring_in(-10);
        assert!(!is_valid(&token));
        assert!(is_near_expiry(&token, DEFAULT_REFRESH_THRESHOLD));
    }

    #[test]
    fn test_expiry_boundary_is_invalid() {
        let now = Utc::now();
        let exp = now.timestamp();
        let token = make_token(&format!(r#"{{"exp":{}}}"#, exp));
        // exp*1000 <= now
        let at = DateTime::from_timestamp(exp, 0).unwrap();
        assert!(!is_valid_at(&token, at));
        assert!(!is_valid_at(&token, at + chrono::Duration::milliseconds(1)));
        assert!(is_valid_at(&token, at - chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_near_expiry_within_threshold() {
        let token = token_expiring_in(60);
        assert!(is_valid(&token));
        assert!(is_near_expiry(&token, Duration::from_millis(300_000)));
        assert!(!is_near_expiry(&token, Duration::from_secs(10)));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let cases = vec![
            String::new(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "header.!!!not-base64!!!.sig".to_string(),
            make_token("not json"),
            make_token(r#"{"sub":"user-1"}"#),
            make_token(r#"{"exp":"tomorrow"}"#),
            make_token("42"),
            make_token(r#"{"exp":-1e300}"#),
        ];

        for token in cases {
            assert!(!is_valid(&token), "expected invalid: {:?}", token);
            assert!(
                is_near_expiry(&token, DEFAULT_REFRESH_THRESHOLD),
                "expected near expiry: {:?}",
                token
            );
            assert!(time_until_expiry(&token).is_none());
        }
    }

    #[test]
    fn test_far_future_exp_has_no_duration() {
        let token = make_token(r#"{"exp":1e300}"#);
        assert!(is_valid(&token));
        assert!(!is_near_expiry(&token, DEFAULT_REFRESH_THRESHOLD));
        assert!(time_until_expiry(&token).is_none());
    }

    #[test]
    fn test_standard_alphabet_with_padding() {
        let exp = Utc::now().timestamp() + 3600;
        let payload = STANDARD.encode(format!(r#"{{"exp":{},"sub":"abc"}}"#, exp));
        let token = format!("h.{}.s", payload);
        assert!(is_valid(&token));
        assert_eq!(subject(&token).as_deref(), Some("abc"));
    }

    #[test]
    fn test_subject_claim() {
        let exp = Utc::now().timestamp() + 3600;
        assert_eq!(
            subject(&make_token(&format!(r#"{{"exp":{},"sub":"42abc"}}"#, exp))).as_deref(),
            Some("42abc")
        );
        assert_eq!(
            subject(&make_token(&format!(r#"{{"exp":{},"sub":42}}"#, exp))).as_deref(),
            Some("42")
        );
        assert!(subject(&make_token(&format!(r#"{{"exp":{}}}"#, exp))).is_none());
    }

    #[test]
    fn test_time_until_expiry() {
        let now = Utc::now();
        let exp = now.timestamp() + 120;
        let token = make_token(&format!(r#"{{"exp":{}}}"#, exp));

        let at = DateTime::from_timestamp(now.timestamp(), 0).unwrap();
        let remaining = time_until_expiry_at(&token, at).unwrap();
        assert_eq!(remaining.num_seconds(), 120);

        let later = at + chrono::Duration::seconds(180);
        assert_eq!(time_until_expiry_at(&token, later).unwrap().num_seconds(), -60);
    }
}
