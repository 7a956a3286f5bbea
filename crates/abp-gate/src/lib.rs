// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-gate
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The state machine that composes the enforcement pipeline: validate the
//! envelope, route it, consult Core, mint a receipt on `PERMIT`, forward to
//! the Executor. Within one request the sequence *validate → route → core →
//! mint → forward* is strict — no step is reordered, skipped, or
//! parallelized. Across requests there is no ordering guarantee and no
//! shared mutable state beyond the read-only configuration and key
//! material.

use std::sync::Arc;
use std::time::Duration;

use abp_config::GatewayConfig;
use abp_core::{CoreDecision, Envelope, GateResult};
use abp_core_client::CoreClient;
use abp_error::ErrorCode;
use abp_forwarder::Forwarder;
use abp_receipt::{sign_receipt, SignReceiptInput};
use abp_telemetry::{PipelineStage, RequestId};
use ed25519_dalek::SigningKey;

/// Holds the pipeline's collaborators and runs [`GateOrchestrator::handle`]
/// for each incoming envelope.
///
/// `Arc`-shared across request handlers; everything it owns is read-only
/// after construction, matching the "no shared mutable state" requirement.
pub struct GateOrchestrator {
    config: Arc<GatewayConfig>,
    targets: abp_core::TargetTable,
    core_client: CoreClient,
    forwarder: Forwarder,
    signing_key: SigningKey,
}

impl GateOrchestrator {
    /// Build an orchestrator from a validated configuration and the
    /// gateway's loaded Ed25519 signing key.
    pub fn new(config: Arc<GatewayConfig>, signing_key: SigningKey) -> Self {
        let core_timeout = Duration::from_millis(config.core.timeout_ms);
        let headers = config
            .core
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let core_client = CoreClient::new(config.core.core_base_url.clone(), core_timeout, headers);
        let forwarder = Forwarder::new(core_timeout);
        let targets = config
            .targets
            .iter()
            .map(|(service, entry)| {
                (
                    service.clone(),
                    abp_core::ForwardTarget {
                        service: service.clone(),
                        url: entry.url.clone(),
                        bearer_token: entry.bearer_token.clone(),
                    },
                )
            })
            .collect();
        Self {
            config,
            targets,
            core_client,
            forwarder,
            signing_key,
        }
    }

    /// Run `envelope` through the full pipeline and return the terminal
    /// [`GateResult`].
    pub async fn handle(&self, envelope: Envelope) -> GateResult {
        let request_id = RequestId::new();

        if !envelope_is_valid(&envelope) {
            return deny_and_log(request_id, PipelineStage::Validate, ErrorCode::InvalidOrMissingGateRequest);
        }

        let action = match envelope.execute.action() {
            Some(a) => a,
            None => return deny_and_log(request_id, PipelineStage::Route, ErrorCode::InvalidActionFormat),
        };
        let (service, _operation) = match abp_router::parse_action(action) {
            Ok(parsed) => parsed,
            Err(e) => {
                let result = GateResult::deny("DENY", e.as_str());
                log_stage_deny(request_id, PipelineStage::Route, &result);
                return result;
            }
        };
        let target = match abp_router::resolve_target(&service, &self.targets) {
            Ok(t) => t.clone(),
            Err(e) => {
                let result = GateResult::deny("DENY", e.as_str());
                log_stage_deny(request_id, PipelineStage::Route, &result);
                return result;
            }
        };

        let local_intent_hash = abp_receipt::compute_intent_hash(&envelope.intent);
        let local_execute_hash = abp_receipt::compute_execute_hash(&envelope.execute);

        let decision = self.core_client.execute(&envelope).await;

        let (authority_key_id, core_issued_at, core_expires_at, core_time) = match &decision {
            CoreDecision::Permit {
                execute_hash,
                intent_hash,
                authority_key_id,
                issued_at,
                expires_at,
                time,
            } => {
                // The receipt's binding digests are always the gateway's own
                // canonical computation, never Core's — the Executor verifier
                // recomputes `sha256_hex(received_execute)` against exactly
                // this value (data-model invariant 2), so substituting Core's
                // hash here would make every receipt unverifiable whenever
                // Core's digest differs byte-for-byte. Core's hash is only
                // compared for a divergence warning.
                if let Some(core_execute_hash) = execute_hash {
                    if *core_execute_hash != local_execute_hash {
                        tracing::warn!(
                            local = %local_execute_hash,
                            core = %core_execute_hash,
                            "execute hash diverges between core and local computation; receipt binds to the locally computed digest"
                        );
                    }
                }
                if let Some(core_intent_hash) = intent_hash {
                    if *core_intent_hash != local_intent_hash {
                        tracing::warn!(
                            local = %local_intent_hash,
                            core = %core_intent_hash,
                            "intent hash diverges between core and local computation; receipt binds to the locally computed digest"
                        );
                    }
                }

                (authority_key_id.clone(), *issued_at, *expires_at, *time)
            }
            CoreDecision::Deny { reason } | CoreDecision::Escalate { reason } => {
                let decision_str = decision.decision_str();
                let reason = reason
                    .clone()
                    .unwrap_or_else(|| ErrorCode::CoreDenied.as_code_str());
                let result = GateResult::deny(decision_str, reason);
                log_stage_deny(request_id, PipelineStage::Core, &result);
                return result;
            }
        };

        let actor_id = envelope.intent.actor_id().unwrap_or_default().to_string();
        let intent_name = envelope.intent.intent_name().unwrap_or_default().to_string();
        let result_authority_key_id = authority_key_id.clone();

        let receipt = match sign_receipt(
            SignReceiptInput {
                adapter_id: self.config.adapter_id.clone(),
                service: target.service.clone(),
                actor_id,
                intent: intent_name,
                intent_hash: local_intent_hash.clone(),
                execute_hash: local_execute_hash.clone(),
                authority_key_id,
                core_issued_at,
                core_expires_at,
                core_time,
                ttl_seconds: self.config.receipt_ttl_seconds,
            },
            &self.signing_key,
        ) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "failed to mint receipt after core permit");
                return deny_and_log(request_id, PipelineStage::Mint, ErrorCode::ReceiptMintFailed);
            }
        };

        let outcome = self
            .forwarder
            .forward(&target, &envelope.intent, &envelope.execute, &receipt)
            .await;

        match outcome {
            Ok(outcome) => {
                let result = GateResult {
                    decision: "PERMIT".to_string(),
                    reason: Some("forwarded_after_core_permit".to_string()),
                    receipt: Some(receipt),
                    forward_status: Some(outcome.status),
                    forward_body: Some(outcome.body),
                    execute_hash: Some(local_execute_hash),
                    intent_hash: Some(local_intent_hash),
                    authority_key_id: result_authority_key_id,
                };
                abp_telemetry::log_gate_result(
                    request_id,
                    PipelineStage::Forward,
                    &result.decision,
                    result.reason.as_deref(),
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "forwarding to executor failed");
                deny_and_log(request_id, PipelineStage::Forward, ErrorCode::ForwardingFailed)
            }
        }
    }
}

fn deny_and_log(request_id: RequestId, stage: PipelineStage, code: ErrorCode) -> GateResult {
    let result = GateResult::deny_with_code(code);
    log_stage_deny(request_id, stage, &result);
    result
}

fn log_stage_deny(request_id: RequestId, stage: PipelineStage, result: &GateResult) {
    abp_telemetry::log_gate_result(
        request_id,
        stage,
        &result.decision,
        result.reason.as_deref(),
    );
}

/// Structural validity predicate: body present, `intent.actor.id` and
/// `intent.intent` non-empty, `execute`/`acceptance` both present as
/// mappings.
fn envelope_is_valid(envelope: &Envelope) -> bool {
    envelope.intent.actor_id().is_some()
        && envelope.intent.intent_name().is_some()
        && envelope.execute.0.is_object()
        && envelope.acceptance.0.is_object()
}

#[cfg(test)]
mod tests {
    use super::*;
    use abp_config::{CoreClientSettings, TargetEntry};
    use abp_core::{AcceptancePayload, ExecutePayload, IntentPayload};
    use abp_receipt::generate_keypair;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_envelope() -> Envelope {
        Envelope {
            intent: IntentPayload(json!({"actor": {"id": "u1"}, "intent": "refund"})),
            execute: ExecutePayload(json!({"action": "payments:refund", "amount": 100})),
            acceptance: AcceptancePayload(json!({"signature": "sig"})),
        }
    }

    async fn orchestrator_with(core_url: String, executor_url: String) -> GateOrchestrator {
        let mut targets = BTreeMap::new();
        targets.insert(
            "payments".to_string(),
            TargetEntry {
                url: executor_url,
                bearer_token: None,
            },
        );
        let config = Arc::new(GatewayConfig {
            adapter_id: "gw-1".to_string(),
            core: CoreClientSettings {
                core_base_url: core_url,
                timeout_ms: 2_000,
                ..Default::default()
            },
            targets,
            ..Default::default()
        });
        let (signing_key, _pem) = generate_keypair().unwrap();
        GateOrchestrator::new(config, signing_key)
    }

    #[tokio::test]
    async fn happy_path_forwards_after_permit() {
        let core = MockServer::start().await;
        let executor = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "decision": "PERMIT",
                "executeHash": "h_e",
                "intentHash": "h_i",
                "authorityKeyId": "k1",
            })))
            .mount(&core)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&executor)
            .await;

        let orchestrator = orchestrator_with(core.uri(), executor.uri()).await;
        let envelope = sample_envelope();
        let local_execute_hash = abp_receipt::compute_execute_hash(&envelope.execute);
        let local_intent_hash = abp_receipt::compute_intent_hash(&envelope.intent);
        let result = orchestrator.handle(envelope).await;

        assert_eq!(result.decision, "PERMIT");
        assert_eq!(result.reason.as_deref(), Some("forwarded_after_core_permit"));
        assert_eq!(result.forward_status, Some(200));
        assert_eq!(result.authority_key_id.as_deref(), Some("k1"));
        // Core's "h_e"/"h_i" deliberately don't match the real canonical
        // digests: the receipt must bind to the locally computed hash
        // regardless, since that's what the Executor verifier recomputes.
        assert_eq!(result.execute_hash.as_deref(), Some(local_execute_hash.as_str()));
        assert_eq!(result.intent_hash.as_deref(), Some(local_intent_hash.as_str()));
        let receipt = result.receipt.expect("permit carries a receipt");
        assert_eq!(receipt.execute_hash, local_execute_hash);
        assert_eq!(receipt.intent_hash, local_intent_hash);
    }

    #[tokio::test]
    async fn core_deny_short_circuits_before_forwarding() {
        let core = MockServer::start().await;
        let executor = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "decision": "DENY",
                "reason": "schema_violation",
            })))
            .mount(&core)
            .await;
        // No executor mock registered: any call would 404 and the test
        // would still pass on decision, but forward_status asserted absent.

        let orchestrator = orchestrator_with(core.uri(), executor.uri()).await;
        let result = orchestrator.handle(sample_envelope()).await;

        assert_eq!(result.decision, "DENY");
        assert_eq!(result.reason.as_deref(), Some("schema_violation"));
        assert!(result.forward_status.is_none());
        assert!(result.receipt.is_none());
    }

    #[tokio::test]
    async fn unknown_action_denies_before_core_is_consulted() {
        let core = MockServer::start().await;
        let executor = MockServer::start().await;
        // No mock registered on `core`: if the orchestrator called it, the
        // request would fail to match and wiremock would panic on drop.

        let orchestrator = orchestrator_with(core.uri(), executor.uri()).await;
        let mut envelope = sample_envelope();
        envelope.execute = ExecutePayload(json!({"action": "unknown:op"}));

        let result = orchestrator.handle(envelope).await;
        assert_eq!(result.decision, "DENY");
        assert_eq!(result.reason.as_deref(), Some("unknown_forward_target"));
    }

    #[tokio::test]
    async fn malformed_action_denies_before_routing() {
        let core = MockServer::start().await;
        let executor = MockServer::start().await;

        let orchestrator = orchestrator_with(core.uri(), executor.uri()).await;
        let mut envelope = sample_envelope();
        envelope.execute = ExecutePayload(json!({"action": "payments_refund"}));

        let result = orchestrator.handle(envelope).await;
        assert_eq!(result.decision, "DENY");
        assert_eq!(result.reason.as_deref(), Some("invalid_action_format"));
    }

    #[tokio::test]
    async fn structurally_invalid_envelope_denies_before_anything_else() {
        let core = MockServer::start().await;
        let executor = MockServer::start().await;

        let orchestrator = orchestrator_with(core.uri(), executor.uri()).await;
        let mut envelope = sample_envelope();
        envelope.intent = IntentPayload(json!({"actor": {"id": ""}, "intent": "refund"}));

        let result = orchestrator.handle(envelope).await;
        assert_eq!(result.decision, "DENY");
        assert_eq!(
            result.reason.as_deref(),
            Some("invalid_or_missing_gate_request")
        );
    }

    #[tokio::test]
    async fn core_unreachable_is_fail_closed_deny() {
        let executor = MockServer::start().await;
        let orchestrator = orchestrator_with("http://127.0.0.1:1".to_string(), executor.uri()).await;

        let result = orchestrator.handle(sample_envelope()).await;
        assert_eq!(result.decision, "DENY");
        assert_eq!(result.reason.as_deref(), Some("core_unreachable"));
    }
}
