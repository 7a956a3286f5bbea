// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-forwarder
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! POSTs a permitted `{intent, execute}` pair and its receipt to the target
//! Executor. The body is built as an explicit two-field structure — never by
//! cloning the envelope and stripping `acceptance` — so it is structurally
//! impossible for an acceptance object to reach an Executor from here.

use std::fmt;
use std::time::Duration;

use abp_core::{ExecutePayload, ForwardTarget, IntentPayload, Receipt};
use base64::Engine;

/// Forwarding failure. The only case reachable in practice is a transport
/// error talking to the Executor; the Gate Orchestrator never calls
/// [`Forwarder::forward`] with a target that wasn't already resolved by
/// `abp-router`.
#[derive(Debug)]
pub enum ForwardError {
    /// The receipt could not be serialized into the `x-solace-receipt`
    /// header. Indicates a bug, not an environmental failure.
    ReceiptEncodingFailed(serde_json::Error),
    /// The request to the Executor failed at the transport level (timeout,
    /// DNS, TCP, TLS).
    NetworkError(String),
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReceiptEncodingFailed(e) => write!(f, "failed to encode receipt header: {e}"),
            Self::NetworkError(e) => write!(f, "forwarding failed: {e}"),
        }
    }
}

impl std::error::Error for ForwardError {}

/// The Executor's raw response: an HTTP status and a best-effort JSON body.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    /// HTTP status code the Executor returned.
    pub status: u16,
    /// The Executor's response body. If it was not valid JSON, this is
    /// `{"_raw": "<the original text>"}`.
    pub body: serde_json::Value,
}

/// Forwards permitted requests to Executors over HTTP.
pub struct Forwarder {
    http: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    /// Build a forwarder with a per-request deadline of `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// POST `{intent, execute}` (acceptance omitted by construction) to
    /// `target.url`, with the receipt carried in the `x-solace-receipt`
    /// header.
    ///
    /// Transport errors surface as [`ForwardError`]; non-2xx HTTP statuses
    /// do **not** — the Executor's response is returned as-is and it is the
    /// Gate Orchestrator's job to decide what that means for the client.
    pub async fn forward(
        &self,
        target: &ForwardTarget,
        intent: &IntentPayload,
        execute: &ExecutePayload,
        receipt: &Receipt,
    ) -> Result<ForwardOutcome, ForwardError> {
        let receipt_bytes =
            serde_json::to_vec(receipt).map_err(ForwardError::ReceiptEncodingFailed)?;
        let receipt_header = base64::engine::general_purpose::STANDARD.encode(receipt_bytes);

        let body = serde_json::json!({ "intent": intent.0, "execute": execute.0 });

        let mut request = self
            .http
            .post(&target.url)
            .header("x-solace-receipt", receipt_header)
            .json(&body);
        if let Some(token) = &target.bearer_token {
            request = request.bearer_auth(token);
        }

        let sent = tokio::time::timeout(self.timeout, request.send()).await;
        let response = match sent {
            Err(_elapsed) => {
                return Err(ForwardError::NetworkError(
                    "forward request did not complete before the deadline".to_string(),
                ));
            }
            Ok(Err(error)) => return Err(ForwardError::NetworkError(error.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({"_raw": text}));

        Ok(ForwardOutcome { status, body })
    }
}
