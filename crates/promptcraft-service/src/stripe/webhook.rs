//! Webhook signature verification.
//!
//! Stripe signs each delivery with the header
//! `Stripe-Signature: t=<unix ts>,v1=<hex hmac>[,v1=<hex hmac>...]`, where each
//! `v1` is `HMAC-SHA256(secret, "<ts>.<raw body>")`.

use super::client::StripeError;
use super::types::WebhookEvent;
use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Verify a webhook signature header against the raw payload.
///
/// `now` is the current Unix time; the header timestamp must be within
/// `tolerance_secs` of it.
///
/// # Errors
///
/// - `StripeError::MalformedSignature` if the header lacks a timestamp or `v1`.
/// - `StripeError::TimestampOutOfTolerance` for stale or future timestamps.
/// - `StripeError::InvalidSignature` if no `v1` matches.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::MalformedSignature)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::MalformedSignature);
    }

    if now.abs_diff(ts) > tolerance_secs.unsigned_abs() {
        return Err(StripeError::TimestampOutOfTolerance);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))
        .map_err(|_| StripeError::InvalidSignature)?;

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature)
    }
}

/// Verify the signature and parse the event.
///
/// # Errors
///
/// Returns the verification error, or `StripeError::Serialization` if the
/// payload is not an event.
pub fn construct_event(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<WebhookEvent, StripeError> {
    verify_signature(payload, header, secret, tolerance_secs, now)?;
    Ok(serde_json::from_str(payload)?)
}
