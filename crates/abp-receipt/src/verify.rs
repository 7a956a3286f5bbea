//! Receipt verification (`verifyReceipt` in the wire contract).

use abp_core::{Receipt, RECEIPT_SCHEMA_VERSION};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::canon::canonical_receipt_bytes;

/// Default clock skew tolerance applied when a caller does not specify one.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 10;

/// Every rejection reason `verify_receipt` can return, in the exact order
/// they are checked. The earliest failing predicate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptRejection {
    /// No public key was supplied to verify against.
    MissingReceiptPublicKey,
    /// `v` is not [`RECEIPT_SCHEMA_VERSION`].
    InvalidReceiptVersion,
    /// `coreDecision` is not `"PERMIT"`.
    ReceiptNotPermit,
    /// `signature` is absent.
    MissingReceiptSignature,
    /// `issuedAt`/`expiresAt` could not be parsed.
    ///
    /// Unreachable via [`Receipt`]'s typed fields (a malformed timestamp
    /// fails JSON deserialization before reaching this function), kept for
    /// parity with the documented wire contract and for callers that
    /// construct a `Receipt` by hand.
    InvalidReceiptTimeFields,
    /// `now + skew < issuedAt`.
    ReceiptNotYetValid,
    /// `now - skew > expiresAt`.
    ReceiptExpired,
    /// The Ed25519 signature does not verify over the canonical receipt.
    InvalidReceiptSignature,
}

impl ReceiptRejection {
    /// Stable wire reason code for this rejection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingReceiptPublicKey => "missing_receipt_public_key",
            Self::InvalidReceiptVersion => "invalid_receipt_version",
            Self::ReceiptNotPermit => "receipt_not_permit",
            Self::MissingReceiptSignature => "missing_receipt_signature",
            Self::InvalidReceiptTimeFields => "invalid_receipt_time_fields",
            Self::ReceiptNotYetValid => "receipt_not_yet_valid",
            Self::ReceiptExpired => "receipt_expired",
            Self::InvalidReceiptSignature => "invalid_receipt_signature",
        }
    }
}

/// Outcome of [`verify_receipt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// `true` iff every predicate passed.
    pub ok: bool,
    /// The stable reason code of the first predicate that failed.
    pub reason: Option<&'static str>,
}

impl VerifyOutcome {
    fn accepted() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn rejected(reason: ReceiptRejection) -> Self {
        Self {
            ok: false,
            reason: Some(reason.as_str()),
        }
    }
}

/// Verify a [`Receipt`]'s signature, schema version, decision, and validity
/// window, checking each predicate in the documented order so the earliest
/// failure wins.
pub fn verify_receipt(
    receipt: &Receipt,
    public_key: Option<&VerifyingKey>,
    now: Option<DateTime<Utc>>,
    clock_skew_seconds: Option<i64>,
) -> VerifyOutcome {
    let Some(public_key) = public_key else {
        return VerifyOutcome::rejected(ReceiptRejection::MissingReceiptPublicKey);
    };

    if receipt.v != RECEIPT_SCHEMA_VERSION {
        return VerifyOutcome::rejected(ReceiptRejection::InvalidReceiptVersion);
    }

    if receipt.core_decision != "PERMIT" {
        return VerifyOutcome::rejected(ReceiptRejection::ReceiptNotPermit);
    }

    let Some(signature_b64) = receipt.signature.as_deref() else {
        return VerifyOutcome::rejected(ReceiptRejection::MissingReceiptSignature);
    };

    let now = now.unwrap_or_else(Utc::now);
    let skew = Duration::seconds(clock_skew_seconds.unwrap_or(DEFAULT_CLOCK_SKEW_SECONDS));

    if now + skew < receipt.issued_at {
        return VerifyOutcome::rejected(ReceiptRejection::ReceiptNotYetValid);
    }
    if now - skew > receipt.expires_at {
        return VerifyOutcome::rejected(ReceiptRejection::ReceiptExpired);
    }

    let Ok(signature_bytes) = base64::engine::general_purpose::STANDARD.decode(signature_b64)
    else {
        return VerifyOutcome::rejected(ReceiptRejection::InvalidReceiptSignature);
    };
    let Ok(signature) = Signature::from_slice(&signature_bytes) else {
        return VerifyOutcome::rejected(ReceiptRejection::InvalidReceiptSignature);
    };
    let Ok(canonical_bytes) = canonical_receipt_bytes(receipt) else {
        return VerifyOutcome::rejected(ReceiptRejection::InvalidReceiptSignature);
    };

    match public_key.verify(canonical_bytes.as_bytes(), &signature) {
        Ok(()) => VerifyOutcome::accepted(),
        Err(_) => VerifyOutcome::rejected(ReceiptRejection::InvalidReceiptSignature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use crate::sign::{sign_receipt, SignReceiptInput};

    fn minted() -> (Receipt, ed25519_dalek::SigningKey, VerifyingKey) {
        let (signing_key, _pem) = generate_keypair().unwrap();
        let verifying_key = signing_key.verifying_key();
        let receipt = sign_receipt(
            SignReceiptInput {
                adapter_id: "gw-1".into(),
                service: "payments".into(),
                actor_id: "u1".into(),
                intent: "refund".into(),
                intent_hash: "hi".into(),
                execute_hash: "he".into(),
                authority_key_id: None,
                core_issued_at: None,
                core_expires_at: None,
                core_time: None,
                ttl_seconds: 30,
            },
            &signing_key,
        )
        .unwrap();
        (receipt, signing_key, verifying_key)
    }

    #[test]
    fn round_trip_accepts_a_freshly_minted_receipt() {
        let (receipt, _sk, vk) = minted();
        let outcome = verify_receipt(&receipt, Some(&vk), None, None);
        assert!(outcome.ok);
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn missing_public_key_is_rejected_first() {
        let (receipt, _sk, _vk) = minted();
        let outcome = verify_receipt(&receipt, None, None, None);
        assert_eq!(outcome.reason, Some("missing_receipt_public_key"));
    }

    #[test]
    fn wrong_key_fails_signature_check() {
        let (receipt, _sk, _vk) = minted();
        let (_other_sk, other_pem) = generate_keypair().unwrap();
        let other_vk = crate::keys::load_verifying_key_pem(&other_pem).unwrap();
        let outcome = verify_receipt(&receipt, Some(&other_vk), None, None);
        assert_eq!(outcome.reason, Some("invalid_receipt_signature"));
    }

    #[test]
    fn tampered_field_invalidates_signature() {
        let (mut receipt, _sk, vk) = minted();
        receipt.execute_hash = "tampered".into();
        let outcome = verify_receipt(&receipt, Some(&vk), None, None);
        assert_eq!(outcome.reason, Some("invalid_receipt_signature"));
    }

    #[test]
    fn expired_receipt_is_rejected() {
        let (receipt, _sk, vk) = minted();
        let far_future = receipt.expires_at + Duration::seconds(3600);
        let outcome = verify_receipt(&receipt, Some(&vk), Some(far_future), Some(0));
        assert_eq!(outcome.reason, Some("receipt_expired"));
    }

    #[test]
    fn not_yet_valid_receipt_is_rejected() {
        let (receipt, _sk, vk) = minted();
        let before_issued = receipt.issued_at - Duration::seconds(3600);
        let outcome = verify_receipt(&receipt, Some(&vk), Some(before_issued), Some(0));
        assert_eq!(outcome.reason, Some("receipt_not_yet_valid"));
    }

    #[test]
    fn clock_skew_tolerates_small_drift() {
        let (receipt, _sk, vk) = minted();
        let just_before = receipt.issued_at - Duration::seconds(5);
        let outcome = verify_receipt(&receipt, Some(&vk), Some(just_before), Some(10));
        assert!(outcome.ok);
    }

    #[test]
    fn non_permit_decision_is_rejected() {
        let (mut receipt, _sk, vk) = minted();
        receipt.core_decision = "DENY".into();
        let outcome = verify_receipt(&receipt, Some(&vk), None, None);
        assert_eq!(outcome.reason, Some("receipt_not_permit"));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let (mut receipt, _sk, vk) = minted();
        receipt.signature = None;
        let outcome = verify_receipt(&receipt, Some(&vk), None, None);
        assert_eq!(outcome.reason, Some("missing_receipt_signature"));
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let (mut receipt, _sk, vk) = minted();
        receipt.v = 2;
        let outcome = verify_receipt(&receipt, Some(&vk), None, None);
        assert_eq!(outcome.reason, Some("invalid_receipt_version"));
    }

    // Invariants 3 and 4: every validly signed receipt round-trips within
    // its TTL, and mutating any string field after signing breaks the
    // signature check.
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_identity() -> impl Strategy<Value = (String, String, String, String)> {
            (
                "[a-z]{1,10}",
                "[a-z]{1,10}",
                "[a-z]{1,10}",
                "[a-z]{1,10}",
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn receipt_round_trips_for_any_valid_identity(
                (adapter_id, service, actor_id, intent) in arb_identity(),
                ttl in 1i64..3600,
            ) {
                let (signing_key, _pem) = generate_keypair().unwrap();
                let verifying_key = signing_key.verifying_key();
                let receipt = sign_receipt(
                    SignReceiptInput {
                        adapter_id,
                        service,
                        actor_id,
                        intent,
                        intent_hash: "hi".into(),
                        execute_hash: "he".into(),
                        authority_key_id: None,
                        core_issued_at: None,
                        core_expires_at: None,
                        core_time: None,
                        ttl_seconds: ttl,
                    },
                    &signing_key,
                ).unwrap();

                let outcome = verify_receipt(&receipt, Some(&verifying_key), None, None);
                prop_assert!(outcome.ok);
                prop_assert_eq!(outcome.reason, None);
            }

            #[test]
            fn tampering_any_string_field_invalidates_the_signature(
                tampered in "[a-z]{1,10}",
                field in 0usize..4,
            ) {
                let (mut receipt, _sk, vk) = minted();
                let original = match field {
                    0 => receipt.service.clone(),
                    1 => receipt.actor_id.clone(),
                    2 => receipt.intent_hash.clone(),
                    _ => receipt.execute_hash.clone(),
                };
                prop_assume!(tampered != original);
                match field {
                    0 => receipt.service = tampered,
                    1 => receipt.actor_id = tampered,
                    2 => receipt.intent_hash = tampered,
                    _ => receipt.execute_hash = tampered,
                }
                let outcome = verify_receipt(&receipt, Some(&vk), None, None);
                prop_assert_eq!(outcome.reason, Some("invalid_receipt_signature"));
            }
        }
    }
}
