// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-core-client
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! HTTP client to the external Core decision service, with strict
//! fail-closed normalization of every transport-level failure mode to a
//! [`CoreDecision::Deny`]. [`CoreClient::execute`] never returns `Result` —
//! there is nothing for the Gate Orchestrator to propagate; every failure is
//! already a decision.

use std::time::Duration;

use abp_core::{CoreDecision, Envelope, IntentPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// HTTP client to `{coreBaseUrl}/v1/execute` (and optionally `/v1/authorize`).
///
/// Holds a single [`reqwest::Client`] for the lifetime of the gateway; the
/// client is internally connection-pooled and cheap to clone, so one
/// instance is shared across all requests via `Arc<AppState>`.
pub struct CoreClient {
    http: reqwest::Client,
    core_base_url: String,
    timeout: Duration,
    static_headers: Vec<(String, String)>,
}

impl CoreClient {
    /// Build a client targeting `core_base_url`, with a per-call deadline of
    /// `timeout` and `static_headers` merged onto every request.
    pub fn new(
        core_base_url: impl Into<String>,
        timeout: Duration,
        static_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            core_base_url: core_base_url.into(),
            timeout,
            static_headers,
        }
    }

    /// Consult Core for a full envelope. Never raises; every failure mode
    /// normalizes to a [`CoreDecision::Deny`] with the matching reason code.
    pub async fn execute(&self, envelope: &Envelope) -> CoreDecision {
        self.call("/v1/execute", envelope).await
    }

    /// Consult Core for an intent alone, ahead of the full execute payload
    /// being known. Same fail-closed guarantees as [`Self::execute`].
    pub async fn authorize(&self, intent: &IntentPayload) -> CoreDecision {
        self.call("/v1/authorize", intent).await
    }

    async fn call(&self, path: &str, body: &impl Serialize) -> CoreDecision {
        let url = format!("{}{path}", self.core_base_url.trim_end_matches('/'));

        let mut request = self.http.post(&url).json(body);
        for (name, value) in &self.static_headers {
            request = request.header(name, value);
        }

        let sent = tokio::time::timeout(self.timeout, request.send()).await;

        let response = match sent {
            Err(_elapsed) => {
                tracing::warn!(core.url = %url, "core call did not complete before the deadline");
                return CoreDecision::Deny {
                    reason: Some("core_timeout".to_string()),
                };
            }
            Ok(Err(error)) => {
                tracing::warn!(core.url = %url, error = %error, "core call failed at the transport level");
                return CoreDecision::Deny {
                    reason: Some("core_unreachable".to_string()),
                };
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(core.url = %url, status = %status, "core returned a non-2xx status");
            return CoreDecision::Deny {
                reason: Some(format!("core_http_{}", status.as_u16())),
            };
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => normalize_decision(&value),
            Err(error) => {
                tracing::warn!(core.url = %url, error = %error, "core response was not valid json");
                CoreDecision::Deny {
                    reason: Some("core_malformed_response".to_string()),
                }
            }
        }
    }
}

fn parse_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}

fn parse_time(value: &serde_json::Value, key: &str) -> Option<DateTime<Utc>> {
    parse_str(value, key).and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Normalize Core's raw JSON response into the typed [`CoreDecision`] shape.
///
/// A missing or unrecognized `decision` string is itself a fail-closed
/// malformed-response condition, not a panic or a propagated parse error.
fn normalize_decision(value: &serde_json::Value) -> CoreDecision {
    let Some(decision) = parse_str(value, "decision") else {
        return CoreDecision::Deny {
            reason: Some("core_malformed_response".to_string()),
        };
    };

    let reason = parse_str(value, "reason").map(String::from);

    match decision {
        "PERMIT" => CoreDecision::Permit {
            execute_hash: parse_str(value, "executeHash").map(String::from),
            intent_hash: parse_str(value, "intentHash").map(String::from),
            authority_key_id: parse_str(value, "authorityKeyId").map(String::from),
            issued_at: parse_time(value, "issuedAt"),
            expires_at: parse_time(value, "expiresAt"),
            time: parse_time(value, "time"),
        },
        "DENY" => CoreDecision::Deny { reason },
        "ESCALATE" => CoreDecision::Escalate { reason },
        _ => CoreDecision::Deny {
            reason: Some("core_malformed_response".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_envelope() -> Envelope {
        Envelope {
            intent: IntentPayload(json!({"actor": {"id": "u1"}, "intent": "refund"})),
            execute: abp_core::ExecutePayload(json!({"action": "payments:refund", "amount": 100})),
            acceptance: abp_core::AcceptancePayload(json!({"signature": "sig"})),
        }
    }

    #[tokio::test]
    async fn permit_response_normalizes_to_permit_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "decision": "PERMIT",
                "executeHash": "he",
                "intentHash": "hi",
                "authorityKeyId": "k1",
            })))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_secs(2), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert!(decision.is_permit());
    }

    #[tokio::test]
    async fn deny_response_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "decision": "DENY",
                "reason": "schema_violation",
            })))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_secs(2), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("schema_violation"));
    }

    #[tokio::test]
    async fn non_2xx_status_becomes_core_http_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_secs(2), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("core_http_502"));
    }

    #[tokio::test]
    async fn malformed_json_becomes_core_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_secs(2), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("core_malformed_response"));
    }

    #[tokio::test]
    async fn missing_decision_field_becomes_core_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_secs(2), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("core_malformed_response"));
    }

    #[tokio::test]
    async fn unreachable_host_becomes_core_unreachable() {
        let client = CoreClient::new(
            "http://127.0.0.1:1",
            Duration::from_secs(2),
            vec![],
        );
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("core_unreachable"));
    }

    #[tokio::test]
    async fn slow_response_times_out_as_core_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let client = CoreClient::new(server.uri(), Duration::from_millis(50), vec![]);
        let decision = client.execute(&sample_envelope()).await;
        assert_eq!(decision.reason(), Some("core_timeout"));
    }
}
