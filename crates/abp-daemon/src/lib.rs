// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-daemon
#![deny(unsafe_code)]
//!
//! The HTTP adapter endpoint around [`abp_gate::GateOrchestrator`]:
//! `POST /v1/gate`, `GET /health`, `GET /v1/public-key`. The gateway holds
//! no mutable state beyond its configuration and key material — every
//! request is independent, and nothing is persisted across restarts.

use std::sync::Arc;

use abp_core::{Envelope, GateResult};
use abp_error::ErrorCode;
use abp_gate::GateOrchestrator;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

/// Shared, read-only state handed to every request handler.
pub struct AppState {
    /// The gate pipeline this adapter drives.
    pub orchestrator: GateOrchestrator,
    /// SPKI PEM of the receipt-signing key's public half, served at
    /// `/v1/public-key` so Executors can fetch it without an out-of-band
    /// channel.
    pub public_key_pem: String,
}

/// An error surfaced by the HTTP layer itself, before the gate pipeline has
/// a chance to produce a [`GateResult`].
///
/// Distinct from a `GateResult{decision: "DENY", ...}`: this type covers
/// failures the pipeline never saw (malformed JSON, wrong method), mapped
/// per the gateway's stable HTTP status table.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode) -> Self {
        Self { status, code }
    }

    fn bad_request(code: ErrorCode) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "decision": "DENY", "reason": self.code.as_code_str() }));
        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) | JsonRejection::BytesRejection(_) => {
                Self::bad_request(ErrorCode::MissingRequestBody)
            }
            _ => Self::bad_request(ErrorCode::InvalidJson),
        }
    }
}

/// Build the Axum router serving the gateway's public surface.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(cmd_health))
        .route("/v1/public-key", get(cmd_public_key))
        .route("/v1/gate", post(cmd_gate))
        .with_state(state)
}

async fn cmd_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn cmd_public_key(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "publicKeyPem": state.public_key_pem }))
}

/// `POST /v1/gate`: run an envelope through the pipeline and translate its
/// [`GateResult`] into the status table from the gateway's external
/// interface contract — `200` for `PERMIT`, `403` for `DENY`/`ESCALATE`,
/// `500` for an internal error (always still paired with a `DENY` body).
async fn cmd_gate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(envelope) = body?;
    let result = state.orchestrator.handle(envelope).await;
    Ok(gate_result_response(result))
}

fn gate_result_response(result: GateResult) -> Response {
    let status = match result.decision.as_str() {
        "PERMIT" => StatusCode::OK,
        "DENY" | "ESCALATE" => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(result)).into_response()
}
