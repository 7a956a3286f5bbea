// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the Solace gateway.
//!
//! Every gateway error carries an [`ErrorCode`] (a machine-readable, stable
//! tag matching the failure-code table the gateway's response contract
//! documents), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`GateError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Envelope shape / transport-level errors (malformed JSON, bad method).
    Protocol,
    /// Action parsing and target-table lookup errors.
    Router,
    /// Errors surfaced while consulting the Core decision service.
    Core,
    /// Receipt minting or verification errors.
    Receipt,
    /// Errors forwarding the permitted request to an Executor.
    Forward,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Protocol => "protocol",
            Self::Router => "router",
            Self::Core => "core",
            Self::Receipt => "receipt",
            Self::Forward => "forward",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error / DENY-reason code.
///
/// Each variant serialises to the exact `snake_case` string a client is
/// expected to switch on. These are the "User-visible failure codes" from
/// the gateway's error-handling contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request used a method other than `POST`.
    MethodNotAllowed,
    /// Request body was not valid JSON.
    InvalidJson,
    /// Request had no body at all.
    MissingRequestBody,
    /// Envelope failed the structural-validity predicate.
    InvalidOrMissingGateRequest,
    /// `execute.action` is missing or not `"<service>:<operation>"`.
    InvalidActionFormat,
    /// `execute.action`'s service half has no configured forward target.
    UnknownForwardTarget,
    /// Core did not respond before the deadline / connection failed.
    CoreUnreachable,
    /// Core call hit the configured timeout explicitly.
    CoreTimeout,
    /// Core responded with a non-2xx HTTP status.
    CoreHttpStatus {
        /// The HTTP status code Core returned.
        status: u16,
    },
    /// Core's response body was not valid JSON, or lacked a `decision` field.
    CoreMalformedResponse,
    /// Core returned `DENY` or `ESCALATE`; this wraps Core's own reason.
    CoreDenied,
    /// Receipt signing failed (bad key material or missing identity fields).
    ReceiptMintFailed,
    /// The outbound request to the Executor failed at the transport level.
    ForwardingFailed,
    /// Something failed that should never fail given valid configuration.
    AdapterInternalError,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MethodNotAllowed
            | Self::InvalidJson
            | Self::MissingRequestBody
            | Self::InvalidOrMissingGateRequest => ErrorCategory::Protocol,

            Self::InvalidActionFormat | Self::UnknownForwardTarget => ErrorCategory::Router,

            Self::CoreUnreachable
            | Self::CoreTimeout
            | Self::CoreHttpStatus { .. }
            | Self::CoreMalformedResponse
            | Self::CoreDenied => ErrorCategory::Core,

            Self::ReceiptMintFailed => ErrorCategory::Receipt,

            Self::ForwardingFailed => ErrorCategory::Forward,

            Self::AdapterInternalError => ErrorCategory::Internal,
        }
    }

    /// Stable `String` representation of the code (e.g. `"core_http_502"`).
    ///
    /// Returns an owned `String` rather than `&'static str` because
    /// [`ErrorCode::CoreHttpStatus`] embeds a runtime status value.
    pub fn as_code_str(&self) -> String {
        match self {
            Self::MethodNotAllowed => "method_not_allowed".to_string(),
            Self::InvalidJson => "invalid_json".to_string(),
            Self::MissingRequestBody => "missing_request_body".to_string(),
            Self::InvalidOrMissingGateRequest => "invalid_or_missing_gate_request".to_string(),
            Self::InvalidActionFormat => "invalid_action_format".to_string(),
            Self::UnknownForwardTarget => "unknown_forward_target".to_string(),
            Self::CoreUnreachable => "core_unreachable".to_string(),
            Self::CoreTimeout => "core_timeout".to_string(),
            Self::CoreHttpStatus { status } => format!("core_http_{status}"),
            Self::CoreMalformedResponse => "core_malformed_response".to_string(),
            Self::CoreDenied => "core_denied".to_string(),
            Self::ReceiptMintFailed => "receipt_mint_failed".to_string(),
            Self::ForwardingFailed => "forwarding_failed".to_string(),
            Self::AdapterInternalError => "adapter_internal_error".to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_code_str())
    }
}

// ---------------------------------------------------------------------------
// GateError
// ---------------------------------------------------------------------------

/// Unified gateway error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use abp_error::{GateError, ErrorCode};
///
/// let err = GateError::new(ErrorCode::CoreTimeout, "core did not respond in time")
///     .with_context("timeout_ms", 8000);
/// ```
pub struct GateError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GateError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GateError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_code_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
