// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-verifier
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The contract an Executor written by a third party must honor to trust a
//! forwarded request. Deliberately free of any HTTP dependency: an Executor
//! author should be able to authenticate a receipt without taking a
//! transport-layer dependency on whatever the gateway happens to use.
//!
//! Implementations either import [`verify_executor_request`] or
//! reimplement its five steps verbatim against the wire contract in
//! `abp-core`.

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;

use abp_core::Receipt;
use abp_receipt::{sha256_hex, verify_receipt};

/// Stable reason codes an Executor can match on, plus the receipt/hash data
/// a caller needs once verification succeeds.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// Whether the request is authentic and should be acted on.
    pub ok: bool,
    /// Stable machine-readable reason code, present when `ok` is `false`.
    pub reason: Option<&'static str>,
    /// The decoded receipt, present once step 1 succeeds regardless of the
    /// outcome of later steps.
    pub receipt: Option<Receipt>,
    /// The execute digest this call recomputed, present once step 4 runs.
    pub execute_hash: Option<String>,
}

impl VerifyOutcome {
    fn rejected(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            receipt: None,
            execute_hash: None,
        }
    }

    fn rejected_with_receipt(reason: &'static str, receipt: Receipt) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            receipt: Some(receipt),
            execute_hash: None,
        }
    }
}

/// Authenticate a forwarded request against the `x-solace-receipt` header
/// it carried.
///
/// Runs the five-step contract in order, short-circuiting at the first
/// failure:
///
/// 1. Base64-decode `header_value`, then JSON-parse it as a [`Receipt`].
/// 2. `receipt.service == expected_service`.
/// 3. Delegate to [`abp_receipt::verify_receipt`] (schema, decision, time
///    window, signature).
/// 4. Recompute the execute digest over `received_execute` and compare it
///    to `receipt.execute_hash`.
///
/// Step 5 (idempotency on `receiptId`/`executeHash`) is the Executor's own
/// responsibility against its own store and is intentionally not performed
/// here.
pub fn verify_executor_request(
    header_value: &str,
    public_key: &VerifyingKey,
    expected_service: &str,
    received_execute: &serde_json::Value,
    now: Option<DateTime<Utc>>,
    skew_seconds: Option<i64>,
) -> VerifyOutcome {
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(header_value.trim()) else {
        return VerifyOutcome::rejected("missing_or_invalid_receipt_header");
    };
    let Ok(receipt) = serde_json::from_slice::<Receipt>(&decoded) else {
        return VerifyOutcome::rejected("missing_or_invalid_receipt_header");
    };

    if receipt.service != expected_service {
        return VerifyOutcome::rejected_with_receipt("receipt_service_mismatch", receipt);
    }

    let outcome = verify_receipt(&receipt, Some(public_key), now, skew_seconds);
    if !outcome.ok {
        let reason = outcome.reason.unwrap_or("invalid_receipt_signature");
        return VerifyOutcome::rejected_with_receipt(reason, receipt);
    }

    let execute_hash = sha256_hex(received_execute);
    if execute_hash != receipt.execute_hash {
        return VerifyOutcome {
            ok: false,
            reason: Some("execute_hash_mismatch"),
            receipt: Some(receipt),
            execute_hash: Some(execute_hash),
        };
    }

    VerifyOutcome {
        ok: true,
        reason: None,
        receipt: Some(receipt),
        execute_hash: Some(execute_hash),
    }
}
