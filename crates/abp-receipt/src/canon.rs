//! Deterministic JSON canonicalization and SHA-256 digesting.
//!
//! The workspace's `serde_json` dependency does not enable the
//! `preserve_order` feature, so [`serde_json::Map`] is backed by a
//! [`std::collections::BTreeMap`] and already iterates object keys in
//! ascending order, recursively. That means `serde_json::to_string` already
//! produces the canonical form this module promises; the functions here
//! exist to name that guarantee and pin the hash algorithm.

use abp_core::{AcceptancePayload, ExecutePayload, IntentPayload, Receipt};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::ReceiptError;

/// Produce the canonical, whitespace-free JSON representation of `value`.
///
/// Keys are emitted in ascending Unicode code-point order at every nesting
/// level; array order is preserved; numbers and strings serialize exactly as
/// `serde_json` serializes them elsewhere in this workspace.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).expect("serializing a serde_json::Value never fails")
}

/// Lowercase-hex SHA-256 of [`canonical_json`]`(value)`.
pub fn sha256_hex(value: &Value) -> String {
    let bytes = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of an envelope's `intent` sub-mapping.
pub fn compute_intent_hash(intent: &IntentPayload) -> String {
    sha256_hex(&intent.0)
}

/// Digest of an envelope's `execute` sub-mapping.
pub fn compute_execute_hash(execute: &ExecutePayload) -> String {
    sha256_hex(&execute.0)
}

/// Digest of an envelope's `acceptance` sub-mapping.
///
/// Only used by tests; the gateway itself never needs an acceptance digest
/// since it forwards acceptance to Core as-is and never re-derives it.
#[cfg(test)]
pub fn compute_acceptance_hash(acceptance: &AcceptancePayload) -> String {
    sha256_hex(&acceptance.0)
}

/// Canonical bytes of a receipt with `signature` cleared, the pre-image for
/// both signing and verification.
pub(crate) fn canonical_receipt_bytes(receipt: &Receipt) -> Result<String, ReceiptError> {
    let mut unsigned = receipt.clone();
    unsigned.signature = None;
    let value = serde_json::to_value(&unsigned)?;
    Ok(canonical_json(&value))
}
