// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable wire contract for the Solace gateway: the envelope a client
//! submits, the decision Core returns, the receipt the gateway mints, and the
//! static routing table that maps an action to an Executor.
//!
//! If you only take one dependency to talk to the gateway, take this one.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current schema version embedded in every minted receipt.
///
/// # Examples
///
/// ```
/// assert_eq!(abp_core::RECEIPT_SCHEMA_VERSION, 1);
/// ```
pub const RECEIPT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Opaque intent payload.
///
/// Only `actor.id` and `intent` are pulled out as typed accessors; everything
/// else (`context`, `meta`, ...) is arbitrary JSON-serializable content the
/// gateway never interprets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct IntentPayload(pub serde_json::Value);

impl IntentPayload {
    /// `intent.actor.id`, if present and a non-empty string.
    pub fn actor_id(&self) -> Option<&str> {
        self.0
            .get("actor")?
            .get("id")?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// `intent.intent`, the semantic action name, if present and non-empty.
    pub fn intent_name(&self) -> Option<&str> {
        self.0.get("intent")?.as_str().filter(|s| !s.is_empty())
    }
}

/// Opaque execute payload: the side-effect request body.
///
/// Only `action` is pulled out as a typed accessor. Every other field is the
/// Executor's contract, not the gateway's.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExecutePayload(pub serde_json::Value);

impl ExecutePayload {
    /// `execute.action`, the `"<service>:<operation>"` string, if present.
    pub fn action(&self) -> Option<&str> {
        self.0.get("action")?.as_str()
    }
}

/// Opaque acceptance payload: the issuer's signed commitment to `execute`.
///
/// The gateway never validates this; Core does. It must never be forwarded
/// to an Executor (invariant 6 of the data model).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AcceptancePayload(pub serde_json::Value);

/// The `{intent, execute, acceptance}` triple a client submits to `/v1/gate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Envelope {
    /// Who is asking, and for what semantic action.
    pub intent: IntentPayload,
    /// The side-effect payload to be routed and, if permitted, forwarded.
    pub execute: ExecutePayload,
    /// The issuer's commitment to `execute`; consumed by Core only.
    pub acceptance: AcceptancePayload,
}

// ---------------------------------------------------------------------------
// CoreDecision
// ---------------------------------------------------------------------------

/// The decision Core returns for a given envelope.
///
/// A closed sum of `PERMIT | DENY | ESCALATE` plus optional metadata,
/// represented as a discriminated enum rather than a bare string field, with
/// the string representation kept only at the wire boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreDecision {
    /// Core permits the side effect. Only this variant unlocks forwarding.
    Permit {
        /// Digest of `execute`, if Core computed one.
        #[serde(skip_serializing_if = "Option::is_none")]
        execute_hash: Option<String>,
        /// Digest of `intent`, if Core computed one.
        #[serde(skip_serializing_if = "Option::is_none")]
        intent_hash: Option<String>,
        /// Identity of the authority whose key signed the underlying grant.
        #[serde(skip_serializing_if = "Option::is_none")]
        authority_key_id: Option<String>,
        /// When Core issued this decision.
        #[serde(skip_serializing_if = "Option::is_none")]
        issued_at: Option<DateTime<Utc>>,
        /// When this decision expires, per Core.
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
        /// Core's own clock reading at decision time.
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<DateTime<Utc>>,
    },
    /// Core denies the side effect.
    Deny {
        /// Stable machine-readable reason code.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Core declines to decide; treated the same as `Deny` by the gateway.
    Escalate {
        /// Stable machine-readable reason code.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl CoreDecision {
    /// `true` for [`CoreDecision::Permit`].
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit { .. })
    }

    /// The reason code, if this is a `Deny`/`Escalate` carrying one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Deny { reason } | Self::Escalate { reason } => reason.as_deref(),
            Self::Permit { .. } => None,
        }
    }

    /// The wire-level decision string (`PERMIT`/`DENY`/`ESCALATE`).
    pub fn decision_str(&self) -> &'static str {
        match self {
            Self::Permit { .. } => "PERMIT",
            Self::Deny { .. } => "DENY",
            Self::Escalate { .. } => "ESCALATE",
        }
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// The signed artifact the gateway mints on a Core `PERMIT`.
///
/// Every field except `signature` is covered by the Ed25519 signature, over
/// the canonical JSON of the receipt with `signature` itself excluded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Schema version, fixed to [`RECEIPT_SCHEMA_VERSION`].
    pub v: u32,
    /// Fresh UUIDv4 minted for this receipt.
    pub receipt_id: Uuid,
    /// Stable identity of the gateway deployment that minted this receipt.
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
    /// Always `"PERMIT"`; receipts only exist for permits.
    pub core_decision: String,
    /// Authority key id as echoed by Core, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_key_id: Option<String>,
    /// Core's own `issuedAt`, echoed for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_issued_at: Option<DateTime<Utc>>,
    /// Core's own `expiresAt`, echoed for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_expires_at: Option<DateTime<Utc>>,
    /// Core's own clock reading, echoed for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_time: Option<DateTime<Utc>>,
    /// When this receipt was minted.
    pub issued_at: DateTime<Utc>,
    /// When this receipt stops being valid; `issued_at + receiptTtlSeconds`.
    pub expires_at: DateTime<Utc>,
    /// Base64-standard-encoded Ed25519 signature, empty until signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

// ---------------------------------------------------------------------------
// ForwardTarget
// ---------------------------------------------------------------------------

/// A statically-configured Executor endpoint, loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardTarget {
    /// Logical service name; matched against `execute.action`'s service half.
    pub service: String,
    /// URL the Forwarder POSTs to.
    pub url: String,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

/// Map of service name to its [`ForwardTarget`], the static routing table.
pub type TargetTable = BTreeMap<String, ForwardTarget>;

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

/// The result of running an [`Envelope`] through the gate pipeline.
///
/// Returned verbatim (modulo HTTP status mapping) as the `/v1/gate` response
/// body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// `PERMIT`, `DENY`, or `ESCALATE` (the terminal wire decision).
    pub decision: String,
    /// Stable reason code, present on every non-permit-forwarded outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The minted receipt, present only when forwarding actually happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    /// HTTP status the Executor returned, if the Forwarder was invoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_status: Option<u16>,
    /// The Executor's response body, parsed as JSON if possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_body: Option<serde_json::Value>,
    /// The execute digest computed or echoed for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_hash: Option<String>,
    /// The intent digest computed or echoed for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_hash: Option<String>,
    /// The authority key id echoed by Core, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_key_id: Option<String>,
}

impl GateResult {
    /// A terminal `DENY`/`ESCALATE` result carrying only a reason code.
    pub fn deny(decision: &str, reason: impl Into<String>) -> Self {
        Self {
            decision: decision.to_string(),
            reason: Some(reason.into()),
            receipt: None,
            forward_status: None,
            forward_body: None,
            execute_hash: None,
            intent_hash: None,
            authority_key_id: None,
        }
    }

    /// A terminal `DENY` result carrying one of the gateway's stable
    /// [`abp_error::ErrorCode`]s as its reason.
    pub fn deny_with_code(code: abp_error::ErrorCode) -> Self {
        Self::deny("DENY", code.as_code_str())
    }
}
