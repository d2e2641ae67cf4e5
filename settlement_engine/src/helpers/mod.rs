mod webhook_signature;

pub use webhook_signature::{
    sign_hex_body,
    sign_stripe_payload,
    SecretLookup,
    SignatureVerifier,
    Verification,
    VerificationReason,
    WebhookHeaders,
    DEFAULT_SIGNATURE_TOLERANCE_SECS,
    POSTMATES_SIGNATURE_HEADER,
    STRIPE_SIGNATURE_HEADER,
    UBER_SIGNATURE_HEADER,
};
