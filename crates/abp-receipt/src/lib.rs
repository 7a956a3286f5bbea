// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-receipt
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Canonical JSON, SHA-256 digesting, and Ed25519 receipt signing and
//! verification for the Solace gateway. The cryptographic binding between a
//! Core `PERMIT` and the exact `execute` payload forwarded to an Executor
//! rests entirely on [`canon::canonical_json`] being bit-identical across
//! every implementation that speaks this wire contract.

mod canon;
mod keys;
mod sign;
mod verify;

pub use canon::{canonical_json, compute_execute_hash, compute_intent_hash, sha256_hex};
#[cfg(test)]
pub use canon::compute_acceptance_hash;
pub use keys::{
    encode_signing_key_pem, encode_verifying_key_pem, generate_keypair, load_signing_key_pem,
    load_verifying_key_pem,
};
pub use sign::{sign_receipt, SignReceiptInput};
pub use verify::{verify_receipt, ReceiptRejection, VerifyOutcome, DEFAULT_CLOCK_SKEW_SECONDS};

// Re-export so consumers can depend on abp-receipt alone for receipt types.
pub use abp_core::Receipt;

/// Errors raised while minting or loading key material for a receipt.
///
/// These are startup/mint-time failures, distinct from the rejection
/// *reasons* [`verify_receipt`] returns for an already-constructed receipt.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    /// `adapterId` was empty.
    #[error("adapter id must not be empty")]
    MissingAdapterId,
    /// The routing result's service name was empty.
    #[error("service must not be empty")]
    MissingService,
    /// `intent.actor.id` was empty.
    #[error("actor id must not be empty")]
    MissingActorId,
    /// `intent.intent` was empty.
    #[error("intent must not be empty")]
    MissingIntent,
    /// The supplied PEM was not a valid PKCS8 Ed25519 private key.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),
    /// The supplied PEM was not a valid SPKI Ed25519 public key.
    #[error("invalid verifying key: {0}")]
    InvalidVerifyingKey(String),
    /// The receipt could not be serialized for signing.
    #[error("receipt serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
