//! Receipt minting (`signReceipt` in the wire contract).

use abp_core::{Receipt, RECEIPT_SCHEMA_VERSION};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use uuid::Uuid;

use crate::canon::canonical_receipt_bytes;
use crate::ReceiptError;

/// Everything [`sign_receipt`] needs besides the signing key itself.
#[derive(Debug, Clone)]
pub struct SignReceiptInput {
    /// Stable identity of the gateway deployment minting this receipt.
    pub adapter_id: String,
    /// Target Executor logical name (the routing result).
    pub service: String,
    /// `intent.actor.id`, copied from the envelope.
    pub actor_id: String,
    /// `intent.intent`, copied from the envelope.
    pub intent: String,
    /// Digest of `intent` (Core's, if supplied, else locally computed).
    pub intent_hash: String,
    /// Digest of `execute` (Core's, if supplied, else locally computed).
    pub execute_hash: String,
    /// Authority key id as returned by Core, if any.
    pub authority_key_id: Option<String>,
    /// Core's own `issuedAt`, echoed for audit.
    pub core_issued_at: Option<DateTime<Utc>>,
    /// Core's own `expiresAt`, echoed for audit.
    pub core_expires_at: Option<DateTime<Utc>>,
    /// Core's own clock reading, echoed for audit.
    pub core_time: Option<DateTime<Utc>>,
    /// Receipt validity window length in seconds.
    pub ttl_seconds: i64,
}

/// Build, timestamp, and Ed25519-sign a [`Receipt`].
///
/// `issuedAt = now()`, `expiresAt = issuedAt + ttlSeconds`. The signature
/// covers the canonical JSON of every field except `signature` itself.
///
/// # Errors
///
/// Returns [`ReceiptError`] if any required identity field is empty, or if
/// the receipt cannot be serialized for signing.
pub fn sign_receipt(
    input: SignReceiptInput,
    signing_key: &SigningKey,
) -> Result<Receipt, ReceiptError> {
    if input.adapter_id.is_empty() {
        return Err(ReceiptError::MissingAdapterId);
    }
    if input.service.is_empty() {
        return Err(ReceiptError::MissingService);
    }
    if input.actor_id.is_empty() {
        return Err(ReceiptError::MissingActorId);
    }
    if input.intent.is_empty() {
        return Err(ReceiptError::MissingIntent);
    }

    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::seconds(input.ttl_seconds);

    let mut receipt = Receipt {
        v: RECEIPT_SCHEMA_VERSION,
        receipt_id: Uuid::new_v4(),
        adapter_id: input.adapter_id,
        service: input.service,
        actor_id: input.actor_id,
        intent: input.intent,
        intent_hash: input.intent_hash,
        execute_hash: input.execute_hash,
        core_decision: "PERMIT".to_string(),
        authority_key_id: input.authority_key_id,
        core_issued_at: input.core_issued_at,
        core_expires_at: input.core_expires_at,
        core_time: input.core_time,
        issued_at,
        expires_at,
        signature: None,
    };

    let bytes = canonical_receipt_bytes(&receipt)?;
    let signature = signing_key.sign(bytes.as_bytes());
    receipt.signature = Some(base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()));

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    fn sample_input() -> SignReceiptInput {
        SignReceiptInput {
            adapter_id: "gw-1".into(),
            service: "payments".into(),
            actor_id: "u1".into(),
            intent: "refund".into(),
            intent_hash: "hi".into(),
            execute_hash: "he".into(),
            authority_key_id: Some("k1".into()),
            core_issued_at: None,
            core_expires_at: None,
            core_time: None,
            ttl_seconds: 30,
        }
    }

    #[test]
    fn signs_a_fully_populated_receipt() {
        let (key, _pem) = generate_keypair().unwrap();
        let receipt = sign_receipt(sample_input(), &key).unwrap();
        assert_eq!(receipt.v, RECEIPT_SCHEMA_VERSION);
        assert_eq!(receipt.core_decision, "PERMIT");
        assert!(receipt.signature.is_some());
        assert_eq!(receipt.expires_at - receipt.issued_at, Duration::seconds(30));
    }

    #[test]
    fn rejects_empty_adapter_id() {
        let (key, _pem) = generate_keypair().unwrap();
        let mut input = sample_input();
        input.adapter_id = String::new();
        assert!(matches!(
            sign_receipt(input, &key),
            Err(ReceiptError::MissingAdapterId)
        ));
    }

    #[test]
    fn each_receipt_gets_a_fresh_id() {
        let (key, _pem) = generate_keypair().unwrap();
        let r1 = sign_receipt(sample_input(), &key).unwrap();
        let r2 = sign_receipt(sample_input(), &key).unwrap();
        assert_ne!(r1.receipt_id, r2.receipt_id);
    }
}
