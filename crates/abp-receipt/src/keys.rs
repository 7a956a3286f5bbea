//! PEM loading and generation for Ed25519 receipt key material.

use ed25519_dalek::{SigningKey, VerifyingKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use spki::{DecodePublicKey, EncodePublicKey};

use crate::ReceiptError;

/// Load an Ed25519 signing key from a PKCS8 PEM string.
pub fn load_signing_key_pem(pem: &str) -> Result<SigningKey, ReceiptError> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| ReceiptError::InvalidSigningKey(e.to_string()))
}

/// Load an Ed25519 verifying key from an SPKI PEM string.
pub fn load_verifying_key_pem(pem: &str) -> Result<VerifyingKey, ReceiptError> {
    VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| ReceiptError::InvalidVerifyingKey(e.to_string()))
}

/// Encode a signing key back to PKCS8 PEM, for `abp keygen` output.
pub fn encode_signing_key_pem(key: &SigningKey) -> Result<String, ReceiptError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| ReceiptError::InvalidSigningKey(e.to_string()))
}

/// Encode a verifying key to SPKI PEM, for distribution to Executors.
pub fn encode_verifying_key_pem(key: &VerifyingKey) -> Result<String, ReceiptError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| ReceiptError::InvalidVerifyingKey(e.to_string()))
}

/// Generate a fresh Ed25519 keypair, returning the signing key and the
/// corresponding SPKI public-key PEM.
///
/// Used by `abp keygen` to bootstrap a deployment. The caller is responsible
/// for persisting the private key PEM (via [`encode_signing_key_pem`])
/// somewhere the gateway's configuration can read it from.
pub fn generate_keypair() -> Result<(SigningKey, String), ReceiptError> {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_pem = encode_verifying_key_pem(&signing_key.verifying_key())?;
    Ok((signing_key, public_pem))
}
