// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Structured `tracing` helpers for the gate pipeline. `GateOrchestrator`
//! runs every request through a strict sequence of stages (validate, route,
//! core, mint, forward); this crate gives each stage a consistent set of
//! log fields — `request_id`, `stage`, `decision`, `reason` — so operators
//! can correlate one request's stages across the process's log stream
//! without the gateway itself persisting anything.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Correlates every log line belonging to one `/v1/gate` request.
///
/// Minted once at `abp-daemon`'s request entry point, before the envelope
/// reaches `GateOrchestrator::handle`, and threaded through every stage's
/// [`StageEvent`]. Never persisted; purely a log-correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Mint a fresh, random request id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// PipelineStage
// ---------------------------------------------------------------------------

/// One step of the gate pipeline's strict `validate → route → core → mint →
/// forward` sequence, for tagging structured log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Structural validity check on the incoming envelope.
    Validate,
    /// `execute.action` parsing and target-table lookup.
    Route,
    /// Consulting the external Core decision service.
    Core,
    /// Signing the execution receipt after a Core `PERMIT`.
    Mint,
    /// Forwarding the permitted request to the target Executor.
    Forward,
}

impl PipelineStage {
    /// Stable lowercase name used as the `stage` log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Route => "route",
            Self::Core => "core",
            Self::Mint => "mint",
            Self::Forward => "forward",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageEvent
// ---------------------------------------------------------------------------

/// One pipeline stage's outcome, ready to be emitted as a single structured
/// `tracing` event.
///
/// Carries only what every stage has in common (`request_id`, `stage`, and
/// an optional terminal `decision`/`reason` when the stage ends the
/// request). Stage-specific detail (a target service name, a Core HTTP
/// status, ...) belongs in the owning crate's own `tracing::warn!`/`debug!`
/// calls, not here — this type exists for the fields every caller shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    /// The request this stage belongs to.
    pub request_id: RequestId,
    /// Which pipeline stage produced this event.
    pub stage: PipelineStage,
    /// The terminal wire decision (`PERMIT`/`DENY`/`ESCALATE`), if this
    /// stage ended the request.
    pub decision: Option<String>,
    /// The stable reason code, if this stage ended the request on a
    /// non-permit outcome.
    pub reason: Option<String>,
}

impl StageEvent {
    /// Start building an event for `stage` within `request_id`, with no
    /// terminal decision yet.
    pub fn new(request_id: RequestId, stage: PipelineStage) -> Self {
        Self {
            request_id,
            stage,
            decision: None,
            reason: None,
        }
    }

    /// Attach the terminal decision this stage produced.
    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    /// Attach the stable reason code this stage produced.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Emit this event via `tracing`. `PERMIT` (or no decision yet, i.e. an
    /// in-flight stage) logs at `info`; any other decision logs at `warn`
    /// so DENY/ESCALATE outcomes stand out in the log stream without the
    /// gateway treating them as errors.
    pub fn emit(&self) {
        let is_non_permit = matches!(self.decision.as_deref(), Some(d) if d != "PERMIT");
        if is_non_permit {
            warn!(
                request_id = %self.request_id,
                stage = self.stage.as_str(),
                decision = self.decision.as_deref(),
                reason = self.reason.as_deref(),
                "gate_pipeline_stage"
            );
        } else {
            info!(
                request_id = %self.request_id,
                stage = self.stage.as_str(),
                decision = self.decision.as_deref(),
                reason = self.reason.as_deref(),
                "gate_pipeline_stage"
            );
        }
    }
}

/// Emit the request's terminal outcome, once `GateOrchestrator::handle`
/// returns, tagged with the stage that produced it.
pub fn log_gate_result(
    request_id: RequestId,
    stage: PipelineStage,
    decision: &str,
    reason: Option<&str>,
) {
    let mut event = StageEvent::new(request_id, stage).with_decision(decision);
    if let Some(reason) = reason {
        event = event.with_reason(reason);
    }
    event.emit();
}
