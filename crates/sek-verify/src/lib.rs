//! sek-verify
//!
//! The single trust boundary for transaction data.
//!
//! Architectural decisions:
//! - Every signed envelope passes through [`EnvelopeGate::verify`] before any
//!   other component sees its contents.
//! - [`VerifiedTransaction`] can only be produced by the gate; application
//!   logic cannot construct one, so holding a value IS the proof it passed.
//! - The signature primitive is a [`SignatureVerifier`] trait object and is
//!   treated as a black box: it answers verified / unverified, nothing else.
//! - A rejected or undecodable envelope fails that one envelope. Callers
//!   decide whether to skip (bulk reconciliation) or surface (purchase flow).

use std::fmt;

use sek_schemas::{ProductKind, SignedEnvelope, SubscriptionInfo, TransactionPayload};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Verifier trait
// ---------------------------------------------------------------------------

/// Outcome of the raw signature check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attestation {
    Verified,
    Unverified,
}

impl Attestation {
    pub fn is_verified(&self) -> bool {
        matches!(self, Attestation::Verified)
    }
}

/// Signature-check primitive.
///
/// Implementations must be object-safe and `Send + Sync` so the gate can hold
/// a `Box<dyn SignatureVerifier>` across async task boundaries.
pub trait SignatureVerifier: Send + Sync {
    /// Human-readable name identifying this verifier (e.g. `"shared-secret"`).
    fn name(&self) -> &'static str;

    /// Check `envelope.signature` against `envelope.payload_json`.
    fn attest(&self, envelope: &SignedEnvelope) -> Attestation;
}

/// Deterministic shared-secret verifier: signature is the lowercase hex
/// SHA-256 digest of `secret || payload_json`.
///
/// This is the demo/test scheme; a production integration substitutes the
/// platform's own verifier behind the same trait.
pub struct SharedSecretVerifier {
    secret: String,
}

impl SharedSecretVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produce the signature this verifier accepts for `payload_json`.
    /// Exposed so signing stores (the mock) share one derivation.
    pub fn sign(&self, payload_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(payload_json.as_bytes());
        hex_string(&hasher.finalize())
    }
}

impl SignatureVerifier for SharedSecretVerifier {
    fn name(&self) -> &'static str {
        "shared-secret"
    }

    fn attest(&self, envelope: &SignedEnvelope) -> Attestation {
        if envelope.signature == self.sign(&envelope.payload_json) {
            Attestation::Verified
        } else {
            Attestation::Unverified
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why an envelope was rejected at the gate.
#[derive(Debug)]
pub enum VerifyError {
    /// Signature check failed. The payload must not be trusted.
    SignatureRejected,
    /// Signature passed but the payload document could not be decoded.
    PayloadDecode(String),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::SignatureRejected => write!(f, "envelope signature rejected"),
            VerifyError::PayloadDecode(msg) => write!(f, "envelope payload decode error: {msg}"),
        }
    }
}

impl std::error::Error for VerifyError {}

// ---------------------------------------------------------------------------
// Verified transaction
// ---------------------------------------------------------------------------

/// A transaction whose envelope passed the gate.
///
/// Constructed only inside this crate. Downstream components (classifier,
/// reconciler, purchase flow) accept this type and nothing else, which is
/// what keeps unverified data out of entitlement state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTransaction {
    payload: TransactionPayload,
    envelope: SignedEnvelope,
}

impl VerifiedTransaction {
    pub fn transaction_id(&self) -> &str {
        &self.payload.transaction_id
    }

    pub fn product_id(&self) -> &str {
        &self.payload.product_id
    }

    pub fn kind(&self) -> ProductKind {
        self.payload.kind
    }

    pub fn purchased_at_ms(&self) -> i64 {
        self.payload.purchased_at_ms
    }

    pub fn revocation_at_ms(&self) -> Option<i64> {
        self.payload.revocation_at_ms
    }

    pub fn is_upgraded(&self) -> bool {
        self.payload.is_upgraded
    }

    pub fn subscription(&self) -> Option<&SubscriptionInfo> {
        self.payload.subscription.as_ref()
    }

    /// The raw envelope this transaction was unwrapped from.
    pub fn envelope(&self) -> &SignedEnvelope {
        &self.envelope
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Wraps the signature primitive and payload decoding into one mandatory
/// check surface.
pub struct EnvelopeGate {
    verifier: Box<dyn SignatureVerifier>,
}

impl EnvelopeGate {
    pub fn new(verifier: Box<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    /// Convenience constructor for the shared-secret scheme.
    pub fn shared_secret(secret: impl Into<String>) -> Self {
        Self::new(Box::new(SharedSecretVerifier::new(secret)))
    }

    pub fn verifier_name(&self) -> &'static str {
        self.verifier.name()
    }

    /// Verify one envelope and unwrap its payload.
    ///
    /// Signature is checked before any decoding so a forged envelope never
    /// reaches the JSON parser.
    pub fn verify(&self, envelope: &SignedEnvelope) -> Result<VerifiedTransaction, VerifyError> {
        if !self.verifier.attest(envelope).is_verified() {
            return Err(VerifyError::SignatureRejected);
        }
        let payload = TransactionPayload::from_json(&envelope.payload_json)
            .map_err(|e| VerifyError::PayloadDecode(e.to_string()))?;
        Ok(VerifiedTransaction {
            payload,
            envelope: envelope.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload_json() -> String {
        TransactionPayload {
            transaction_id: "txn-42".to_string(),
            product_id: "coins.pack.large".to_string(),
            kind: ProductKind::Consumable,
            purchased_at_ms: 1_700_000_000_000,
            revocation_at_ms: None,
            is_upgraded: false,
            subscription: None,
        }
        .to_json()
        .unwrap()
    }

    fn signed(secret: &str, payload_json: &str) -> SignedEnvelope {
        SignedEnvelope {
            payload_json: payload_json.to_string(),
            signature: SharedSecretVerifier::new(secret).sign(payload_json),
        }
    }

    #[test]
    fn well_signed_envelope_unwraps_to_payload_fields() {
        let gate = EnvelopeGate::shared_secret("s3cret");
        let envelope = signed("s3cret", &sample_payload_json());

        let tx = gate.verify(&envelope).expect("valid envelope must verify");
        assert_eq!(tx.transaction_id(), "txn-42");
        assert_eq!(tx.product_id(), "coins.pack.large");
        assert_eq!(tx.kind(), ProductKind::Consumable);
        assert_eq!(tx.envelope(), &envelope);
    }

    #[test]
    fn wrong_secret_is_rejected_before_decoding() {
        let gate = EnvelopeGate::shared_secret("right");
        let envelope = signed("wrong", &sample_payload_json());

        match gate.verify(&envelope) {
            Err(VerifyError::SignatureRejected) => {}
            other => panic!("expected SignatureRejected, got {other:?}"),
        }
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let gate = EnvelopeGate::shared_secret("s3cret");
        let mut envelope = signed("s3cret", &sample_payload_json());
        envelope.payload_json = envelope
            .payload_json
            .replace("coins.pack.large", "premium.yearly");

        assert!(
            gate.verify(&envelope).is_err(),
            "payload edited after signing must not verify"
        );
    }

    #[test]
    fn garbage_payload_with_valid_signature_is_a_decode_error() {
        let gate = EnvelopeGate::shared_secret("s3cret");
        let envelope = signed("s3cret", "{not json");

        match gate.verify(&envelope) {
            Err(VerifyError::PayloadDecode(_)) => {}
            other => panic!("expected PayloadDecode, got {other:?}"),
        }
    }

    #[test]
    fn verify_error_display_is_human_readable() {
        assert_eq!(
            VerifyError::SignatureRejected.to_string(),
            "envelope signature rejected"
        );
        let decode = VerifyError::PayloadDecode("eof".to_string());
        assert!(decode.to_string().contains("eof"));
    }

    #[test]
    fn gate_is_generic_over_the_verifier_primitive() {
        struct AlwaysYes;
        impl SignatureVerifier for AlwaysYes {
            fn name(&self) -> &'static str {
                "always-yes"
            }
            fn attest(&self, _envelope: &SignedEnvelope) -> Attestation {
                Attestation::Verified
            }
        }

        let gate = EnvelopeGate::new(Box::new(AlwaysYes));
        assert_eq!(gate.verifier_name(), "always-yes");
        let envelope = SignedEnvelope {
            payload_json: sample_payload_json(),
            signature: "irrelevant".to_string(),
        };
        assert!(gate.verify(&envelope).is_ok());
    }
}
