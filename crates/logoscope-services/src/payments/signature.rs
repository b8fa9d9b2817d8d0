//! Webhook signature verification
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed message is
//! `"<t>.<raw body>"` and the MAC is HMAC-SHA256 keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use logoscope_core::AppError;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// MAC over `"<t>.<body>"`, where `t` is the timestamp text exactly as sent.
fn compute_signature(payload: &[u8], secret: &str, timestamp: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a signature header for `payload`, as the provider would send it.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, AppError> {
    let signature = compute_signature(payload, secret, &timestamp.to_string())?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Verify a signature header against the raw request body.
///
/// `now` is the current unix time; deliveries whose timestamp is further than
/// `tolerance_secs` from it are rejected to bound replay.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let raw_timestamp = timestamp
        .ok_or_else(|| AppError::InvalidSignature("Missing signature timestamp".to_string()))?;
    let timestamp: i64 = raw_timestamp
        .parse()
        .map_err(|_| AppError::InvalidSignature("Malformed signature timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(AppError::InvalidSignature(
            "No v1 signature in header".to_string(),
        ));
    }

    let within_tolerance = now
        .checked_sub(timestamp)
        .map(i64::unsigned_abs)
        .is_some_and(|skew| skew <= tolerance_secs.unsigned_abs());
    if !within_tolerance {
        return Err(AppError::InvalidSignature(
            "Signature timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(payload, secret, raw_timestamp)?;
    let matched = candidates
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(AppError::InvalidSignature(
            "Signature does not match payload".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign_payload(body, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = sign_payload(br#"{"id":"evt_1"}"#, SECRET, 1_700_000_000).unwrap();
        let result = verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, 300, 1_700_000_000);
        assert!(matches!(result, Err(AppError::InvalidSignature(_))));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = b"{}";
        let header = sign_payload(body, "whsec_other", 1_700_000_000).unwrap();
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let body = b"{}";
        let header = sign_payload(body, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_301).is_err());
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let body = b"{}";
        let valid = sign_payload(body, SECRET, 1_700_000_000).unwrap();
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1=deadbeef,v1={}", v1);
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=deadbeef", t);
            let result = verify_signature(b"{}", &header, SECRET, 300, 1_700_000_000);
            assert!(matches!(result, Err(AppError::InvalidSignature(_))));
        }
        let result = verify_signature(b"{}", "t=0,v1=deadbeef", SECRET, 300, i64::MIN);
        assert!(matches!(result, Err(AppError::InvalidSignature(_))));
    }

    #[test]
    fn test_mac_covers_timestamp_as_sent() {
        let body = br#"{"id":"evt_1"}"#;
        let mac = compute_signature(body, SECRET, "01700000000").unwrap();
        let header = format!("t=01700000000,v1={}", mac);
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_000).is_ok());

        // Same instant, but the canonical text was not what got signed.
        let canonical = compute_signature(body, SECRET, "1700000000").unwrap();
        let header = format!("t=01700000000,v1={}", canonical);
        assert!(verify_signature(body, &header, SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_malformed_header() {
        assert!(verify_signature(b"{}", "garbage", SECRET, 300, 0).is_err());
        assert!(verify_signature(b"{}", "t=1", SECRET, 300, 1).is_err());
    }
}
