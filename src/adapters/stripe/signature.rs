//! `Stripe-Signature` verification.
//!
//! Header format is `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The MAC is
//! HMAC-SHA256 over `"{t}.{payload}"` keyed with the endpoint secret.

use {
    chrono::Utc,
    hmac::{Hmac, Mac},
    sha2::Sha256,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, String> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| "invalid timestamp in signature header".to_string())?,
                )
            }
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedHeader {
            timestamp,
            signatures,
        }),
        _ => Err("invalid signature header format".to_string()),
    }
}

fn compute(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid secret key".to_string())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the header against `payload` at time `now`.
pub fn verify_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), String> {
    let parsed = parse_header(header)?;

    if now.abs_diff(parsed.timestamp) > u64::try_from(tolerance_secs).unwrap_or(0) {
        return Err("timestamp outside tolerance window".to_string());
    }

    let expected = compute(secret, parsed.timestamp, payload)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err("no matching v1 signature".to_string())
    }
}

pub fn verify(payload: &[u8], header: &str, secret: &str, tolerance_secs: i64) -> Result<(), String> {
    verify_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

/// Builds a header the way Stripe would. Used by tests and local tooling.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = compute(secret, timestamp, payload).unwrap_or_default();
    format!("t={timestamp},v1={signature}")
}
