//! HTTP surface of the orchestrator.
//!
//! JSON over HTTP, per the adapter-facing contract:
//!
//! - `POST /asr_text` — full triage of one transcript
//! - `POST /guard/check` — Guard decision for a text or an intent
//! - `POST /parse_intent` — LLM intent parse only
//! - `POST /smart-home/cmd`, `POST /sip/call` — loopback adapter stubs
//! - `GET /health` — liveness
//!
//! Malformed JSON bodies answer `400 {status:"error", code:"bad_input"}`.
//! A panicking request is isolated in its own task and answered as an
//! internal error; the process never exits on a request.

use crate::adapters::{DialReceipt, SmartHomeCmd, SmartHomeEcho};
use crate::error::{CompanionError, Result};
use crate::intent::Intent;
use crate::llm::{IntentContext, IntentEngine};
use crate::orchestrator::{Orchestrator, TriageRequest, TriageResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub intent_engine: Arc<dyn IntentEngine>,
}

/// Build the router over the given state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/asr_text", post(asr_text))
        .route("/guard/check", post(guard_check))
        .route("/parse_intent", post(parse_intent))
        .route("/smart-home/cmd", post(smart_home_stub))
        .route("/sip/call", post(sip_stub))
        .with_state(state)
}

/// Serve the router until the listener fails.
///
/// # Errors
///
/// Returns a pipeline error when the server loop exits abnormally.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(CompanionError::Io)?;
    info!(%addr, "orchestrator HTTP surface listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| CompanionError::Pipeline(format!("http server: {e}")))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "xiaoban-orchestrator",
    }))
}

fn bad_input(reason: &str) -> (StatusCode, Json<TriageResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(TriageResponse::error("bad_input", reason)),
    )
}

async fn asr_text(
    State(state): State<AppState>,
    body: std::result::Result<Json<TriageRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_input(&rejection.body_text()),
    };

    // Panic isolation: a crashing stage turns into an error response.
    let orchestrator = Arc::clone(&state.orchestrator);
    let handled =
        tokio::spawn(async move { orchestrator.handle_request(request).await }).await;

    match handled {
        Ok(outcome) => (StatusCode::OK, Json(outcome.response)),
        Err(join_error) => {
            error!(error = %join_error, "triage request panicked");
            (
                StatusCode::OK,
                Json(TriageResponse::error("internal", "request processing failed")),
            )
        }
    }
}

/// Body of `/guard/check`.
#[derive(Debug, Deserialize)]
struct GuardCheckRequest {
    #[serde(rename = "type")]
    kind: GuardCheckKind,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    intent: Option<Intent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GuardCheckKind {
    Asr,
    Intent,
}

async fn guard_check(
    State(state): State<AppState>,
    body: std::result::Result<Json<GuardCheckRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_input(&rejection.body_text()).into_response(),
    };

    match request.kind {
        GuardCheckKind::Asr => {
            let text = request.text.unwrap_or_default();
            Json(state.orchestrator.guard_check_text(&text)).into_response()
        }
        GuardCheckKind::Intent => match request.intent {
            Some(intent) => {
                Json(state.orchestrator.guard_check_intent(&intent)).into_response()
            }
            None => bad_input("intent check requires an intent body").into_response(),
        },
    }
}

/// Body of `/parse_intent`.
#[derive(Debug, Deserialize)]
struct ParseIntentRequest {
    text: String,
    #[serde(default)]
    context: Option<IntentContext>,
}

async fn parse_intent(
    State(state): State<AppState>,
    body: std::result::Result<Json<ParseIntentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_input(&rejection.body_text()).into_response(),
    };
    let context = request.context.unwrap_or_default();
    let intent = state.intent_engine.parse_intent(&request.text, &context).await;
    Json(intent).into_response()
}

async fn smart_home_stub(
    body: std::result::Result<Json<SmartHomeCmd>, JsonRejection>,
) -> axum::response::Response {
    let Json(cmd) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_input(&rejection.body_text()).into_response(),
    };
    Json(SmartHomeEcho {
        status: "ok".to_owned(),
        echo: cmd,
    })
    .into_response()
}

/// Body of `/sip/call`.
#[derive(Debug, Deserialize)]
struct SipCallRequest {
    callee: String,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

async fn sip_stub(
    body: std::result::Result<Json<SipCallRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_input(&rejection.body_text()).into_response(),
    };
    Json(DialReceipt {
        status: "dialing".to_owned(),
        callee: request.callee,
    })
    .into_response()
}
