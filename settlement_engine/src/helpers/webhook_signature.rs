//! # Webhook signature verification
//!
//! Both providers sign their webhooks with HMAC-SHA256, but they differ in what is signed and where the secret comes
//! from.
//!
//! ## Payment processor
//!
//! The `Stripe-Signature` header looks like
//!
//! ```text
//!    t=1700000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! The signed payload is `{t}.{raw body}`, keyed with the platform webhook secret. Any of several `v1` entries may
//! match (the processor sends more than one while a secret is being rolled). The timestamp must lie within the
//! configured tolerance of the current time, which stops old captured requests from being replayed.
//!
//! ## Delivery provider
//!
//! The `X-Uber-Signature` (or legacy `X-Postmates-Signature`) header carries the lowercase hex HMAC of the raw body.
//! The secret belongs to the tenant, so it must be looked up through the order the event refers to. An event about
//! an order we have never seen is rejected outright.
//!
//! ## Unverifiable events
//!
//! When no secret is configured, or (for the delivery provider) the header is absent, the event is *accepted* but the
//! [`Verification`] says why it could not be verified. Callers record that on the ledger entry so tenants can audit
//! every event that was processed without proof of origin.
//!
//! Signature comparison always goes through [`Mac::verify_slice`], which runs in constant time.
use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use serde::{Deserialize, Serialize};
use settle_common::Secret;
use sha2::Sha256;

use crate::db_types::VerificationStatus;

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const UBER_SIGNATURE_HEADER: &str = "x-uber-signature";
pub const POSTMATES_SIGNATURE_HEADER: &str = "x-postmates-signature";
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

//--------------------------------------    WebhookHeaders     ---------------------------------------------------------
/// Request headers relevant to signature checks. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    headers: HashMap<String, String>,
}

impl WebhookHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: AsRef<str>, V: Into<String>>(&mut self, name: K, value: V) {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn with<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WebhookHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

//--------------------------------------     Verification      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    Verified,
    NoSecretConfigured,
    MissingSignature,
    MalformedSignature,
    InvalidSignature,
    TimestampOutOfTolerance,
    OrderNotFound,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NoSecretConfigured => "no_secret_configured",
            Self::MissingSignature => "missing_signature",
            Self::MalformedSignature => "malformed_signature",
            Self::InvalidSignature => "invalid_signature",
            Self::TimestampOutOfTolerance => "timestamp_out_of_tolerance",
            Self::OrderNotFound => "order_not_found",
        }
    }
}

impl Display for VerificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    pub reason: VerificationReason,
}

impl Verification {
    pub fn accepted(reason: VerificationReason) -> Self {
        Self { valid: true, reason }
    }

    pub fn rejected(reason: VerificationReason) -> Self {
        Self { valid: false, reason }
    }

    /// The audit flag stored on the ledger entry for an accepted event. `None` for rejected events, which never reach
    /// the ledger.
    pub fn audit_status(&self) -> Option<VerificationStatus> {
        if !self.valid {
            return None;
        }
        match self.reason {
            VerificationReason::NoSecretConfigured => Some(VerificationStatus::NoSecretConfigured),
            VerificationReason::MissingSignature => Some(VerificationStatus::MissingSignature),
            _ => Some(VerificationStatus::Verified),
        }
    }

    pub fn is_unverified(&self) -> bool {
        self.valid && self.reason != VerificationReason::Verified
    }
}

/// The result of resolving the signing secret before verification.
#[derive(Debug, Clone)]
pub enum SecretLookup {
    Found(Secret<String>),
    /// The secret owner exists but has no secret configured.
    NotConfigured,
    /// The event refers to an order that does not exist, so there is no tenant to take a secret from.
    OrderNotFound,
}

impl SecretLookup {
    /// Treats blank secrets as not configured.
    pub fn from_option(secret: Option<String>) -> Self {
        match secret {
            Some(s) if !s.trim().is_empty() => Self::Found(Secret::new(s)),
            _ => Self::NotConfigured,
        }
    }
}

//--------------------------------------   SignatureVerifier   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureScheme {
    TimestampedPayload { tolerance_secs: i64 },
    HexBody { require_signature: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerifier {
    scheme: SignatureScheme,
}

impl SignatureVerifier {
    /// The payment processor's timestamped scheme.
    pub fn stripe(tolerance_secs: i64) -> Self {
        Self { scheme: SignatureScheme::TimestampedPayload { tolerance_secs } }
    }

    /// The delivery provider's body-only scheme. If `require_signature` is false, unsigned events are accepted and
    /// flagged as `missing_signature`.
    pub fn uber(require_signature: bool) -> Self {
        Self { scheme: SignatureScheme::HexBody { require_signature } }
    }

    pub fn verify(&self, body: &[u8], headers: &WebhookHeaders, secret: &SecretLookup) -> Verification {
        self.verify_at(body, headers, secret, Utc::now())
    }

    pub fn verify_at(
        &self,
        body: &[u8],
        headers: &WebhookHeaders,
        secret: &SecretLookup,
        now: DateTime<Utc>,
    ) -> Verification {
        let result = match self.scheme {
            SignatureScheme::TimestampedPayload { tolerance_secs } => {
                verify_timestamped(body, headers, secret, tolerance_secs, now)
            },
            SignatureScheme::HexBody { require_signature } => verify_hex_body(body, headers, secret, require_signature),
        };
        match (result.valid, result.reason) {
            (true, VerificationReason::Verified) => trace!("🔐️ Webhook signature verified"),
            (true, reason) => warn!("🔐️ Webhook accepted WITHOUT signature verification ({reason})"),
            (false, reason) => warn!("🔐️ Webhook signature rejected ({reason})"),
        }
        result
    }
}

fn verify_timestamped(
    body: &[u8],
    headers: &WebhookHeaders,
    secret: &SecretLookup,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Verification {
    let secret = match secret {
        SecretLookup::Found(s) => s,
        SecretLookup::NotConfigured => return Verification::accepted(VerificationReason::NoSecretConfigured),
        SecretLookup::OrderNotFound => return Verification::rejected(VerificationReason::OrderNotFound),
    };
    let Some(header) = headers.get(STRIPE_SIGNATURE_HEADER) else {
        return Verification::rejected(VerificationReason::MissingSignature);
    };
    let Some(parsed) = parse_stripe_header(header) else {
        return Verification::rejected(VerificationReason::MalformedSignature);
    };
    if (now.timestamp() - parsed.timestamp).abs() > tolerance_secs {
        return Verification::rejected(VerificationReason::TimestampOutOfTolerance);
    }
    let Some(mut mac) = mac_for(secret) else {
        return Verification::rejected(VerificationReason::InvalidSignature);
    };
    mac.update(parsed.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let matched = parsed.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        Verification::accepted(VerificationReason::Verified)
    } else {
        Verification::rejected(VerificationReason::InvalidSignature)
    }
}

fn verify_hex_body(
    body: &[u8],
    headers: &WebhookHeaders,
    secret: &SecretLookup,
    require_signature: bool,
) -> Verification {
    if matches!(secret, SecretLookup::OrderNotFound) {
        return Verification::rejected(VerificationReason::OrderNotFound);
    }
    let header = headers.get(UBER_SIGNATURE_HEADER).or_else(|| headers.get(POSTMATES_SIGNATURE_HEADER));
    let Some(header) = header else {
        return if require_signature {
            Verification::rejected(VerificationReason::MissingSignature)
        } else {
            Verification::accepted(VerificationReason::MissingSignature)
        };
    };
    let secret = match secret {
        SecretLookup::Found(s) => s,
        _ => return Verification::accepted(VerificationReason::NoSecretConfigured),
    };
    let Ok(signature) = hex::decode(header.trim()) else {
        return Verification::rejected(VerificationReason::InvalidSignature);
    };
    let Some(mut mac) = mac_for(secret) else {
        return Verification::rejected(VerificationReason::InvalidSignature);
    };
    mac.update(body);
    match mac.verify_slice(&signature) {
        Ok(()) => Verification::accepted(VerificationReason::Verified),
        Err(_) => Verification::rejected(VerificationReason::InvalidSignature),
    }
}

struct StripeSignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_stripe_header(header: &str) -> Option<StripeSignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.parse::<i64>().ok()?),
            "v1" => signatures.push(hex::decode(value).ok()?),
            // v0 and any future schemes are ignored
            _ => {},
        }
    }
    if signatures.is_empty() {
        return None;
    }
    Some(StripeSignatureHeader { timestamp: timestamp?, signatures })
}

fn mac_for(secret: &Secret<String>) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.reveal().as_bytes()).ok()
}

/// Produces a `Stripe-Signature` header value for `body`, as the payment processor would.
pub fn sign_stripe_payload(secret: &Secret<String>, timestamp: i64, body: &[u8]) -> Option<String> {
    let mut mac = mac_for(secret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let signature = hex::encode(mac.finalize().into_bytes());
    Some(format!("t={timestamp},v1={signature}"))
}

/// Produces an `X-Uber-Signature` header value for `body`, as the delivery provider would.
pub fn sign_hex_body(secret: &Secret<String>, body: &[u8]) -> Option<String> {
    let mut mac = mac_for(secret)?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn secret() -> Secret<String> {
        Secret::new("whsec_test_secret".to_string())
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn stripe_headers(timestamp: i64, body: &[u8]) -> WebhookHeaders {
        let header = sign_stripe_payload(&secret(), timestamp, body).unwrap();
        WebhookHeaders::new().with("Stripe-Signature", header)
    }

    #[test]
    fn stripe_valid_signature() {
        let v = SignatureVerifier::stripe(300);
        let headers = stripe_headers(now().timestamp() - 10, BODY);
        let result = v.verify_at(BODY, &headers, &SecretLookup::Found(secret()), now());
        assert_eq!(result, Verification::accepted(VerificationReason::Verified));
        assert_eq!(result.audit_status(), Some(VerificationStatus::Verified));
    }

    #[test]
    fn stripe_any_v1_may_match() {
        let v = SignatureVerifier::stripe(300);
        let t = now().timestamp();
        let good = sign_stripe_payload(&secret(), t, BODY).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={t},v1={},v1={good_sig}", "00".repeat(32));
        let headers = WebhookHeaders::new().with("stripe-signature", header);
        assert!(v.verify_at(BODY, &headers, &SecretLookup::Found(secret()), now()).valid);
    }

    #[test]
    fn stripe_tampered_body_is_rejected() {
        let v = SignatureVerifier::stripe(300);
        let headers = stripe_headers(now().timestamp(), BODY);
        let result = v.verify_at(b"{}", &headers, &SecretLookup::Found(secret()), now());
        assert_eq!(result, Verification::rejected(VerificationReason::InvalidSignature));
        assert_eq!(result.audit_status(), None);
    }

    #[test]
    fn stripe_stale_timestamp_is_rejected() {
        let v = SignatureVerifier::stripe(300);
        let headers = stripe_headers(now().timestamp() - 301, BODY);
        let result = v.verify_at(BODY, &headers, &SecretLookup::Found(secret()), now());
        assert_eq!(result.reason, VerificationReason::TimestampOutOfTolerance);
        assert!(!result.valid);
        let headers = stripe_headers(now().timestamp() + 301, BODY);
        assert!(!v.verify_at(BODY, &headers, &SecretLookup::Found(secret()), now()).valid);
    }

    #[test]
    fn stripe_missing_or_malformed_header() {
        let v = SignatureVerifier::stripe(300);
        let found = SecretLookup::Found(secret());
        let result = v.verify_at(BODY, &WebhookHeaders::new(), &found, now());
        assert_eq!(result, Verification::rejected(VerificationReason::MissingSignature));
        for bad in ["garbage", "t=abc,v1=00", "t=1700000000", "t=1700000000,v1=zz"] {
            let headers = WebhookHeaders::new().with("Stripe-Signature", bad);
            let result = v.verify_at(BODY, &headers, &found, now());
            assert_eq!(result, Verification::rejected(VerificationReason::MalformedSignature), "{bad}");
        }
    }

    #[test]
    fn stripe_without_secret_is_accepted_but_flagged() {
        let v = SignatureVerifier::stripe(300);
        let result = v.verify_at(BODY, &WebhookHeaders::new(), &SecretLookup::NotConfigured, now());
        assert_eq!(result, Verification::accepted(VerificationReason::NoSecretConfigured));
        assert!(result.is_unverified());
        assert_eq!(result.audit_status(), Some(VerificationStatus::NoSecretConfigured));
    }

    #[test]
    fn uber_valid_and_invalid_signatures() {
        let v = SignatureVerifier::uber(false);
        let sig = sign_hex_body(&secret(), BODY).unwrap();
        let found = SecretLookup::Found(secret());
        let headers = WebhookHeaders::new().with("X-Uber-Signature", sig.clone());
        assert_eq!(v.verify(BODY, &headers, &found), Verification::accepted(VerificationReason::Verified));
        let legacy = WebhookHeaders::new().with("X-Postmates-Signature", sig);
        assert!(v.verify(BODY, &legacy, &found).valid);
        let wrong = WebhookHeaders::new().with("X-Uber-Signature", "ab".repeat(32));
        assert_eq!(v.verify(BODY, &wrong, &found), Verification::rejected(VerificationReason::InvalidSignature));
        let not_hex = WebhookHeaders::new().with("X-Uber-Signature", "not-hex");
        assert_eq!(v.verify(BODY, &not_hex, &found), Verification::rejected(VerificationReason::InvalidSignature));
    }

    #[test]
    fn uber_unknown_order_is_rejected() {
        let v = SignatureVerifier::uber(false);
        let sig = sign_hex_body(&secret(), BODY).unwrap();
        let headers = WebhookHeaders::new().with("X-Uber-Signature", sig);
        let result = v.verify(BODY, &headers, &SecretLookup::OrderNotFound);
        assert_eq!(result, Verification::rejected(VerificationReason::OrderNotFound));
        let result = v.verify(BODY, &WebhookHeaders::new(), &SecretLookup::OrderNotFound);
        assert_eq!(result.reason, VerificationReason::OrderNotFound);
    }

    #[test]
    fn uber_missing_header_policy() {
        let found = SecretLookup::Found(secret());
        let lenient = SignatureVerifier::uber(false).verify(BODY, &WebhookHeaders::new(), &found);
        assert_eq!(lenient, Verification::accepted(VerificationReason::MissingSignature));
        assert_eq!(lenient.audit_status(), Some(VerificationStatus::MissingSignature));
        let strict = SignatureVerifier::uber(true).verify(BODY, &WebhookHeaders::new(), &found);
        assert_eq!(strict, Verification::rejected(VerificationReason::MissingSignature));
    }

    #[test]
    fn uber_tenant_without_secret() {
        let v = SignatureVerifier::uber(false);
        let headers = WebhookHeaders::new().with("X-Uber-Signature", "abcd");
        let result = v.verify(BODY, &headers, &SecretLookup::from_option(Some("   ".into())));
        assert_eq!(result, Verification::accepted(VerificationReason::NoSecretConfigured));
    }
}
