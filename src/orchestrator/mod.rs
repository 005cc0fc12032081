//! Orchestrator: composes the Guard, the intent engine, and the action
//! adapters into the triage state machine.
//!
//! Request flow: preprocess → rules_check → [emergency_bypass |
//! rules_execute | llm_parse] → post_guard → execute. The emergency
//! bypass never touches the LLM. Every request leaves exactly one audit
//! record; HTTP responses carry no timestamps or ids so identical
//! inputs produce identical bytes.

pub mod audit;

use crate::adapters::{AdapterSet, SmartHomeCmd};
use crate::config::{GuardConfig, OrchestratorConfig};
use crate::context::{ContextEntry, ConversationContext};
use crate::guard::geofence::{GeofenceMonitor, GeofenceStatus, OUTSIDE_SAFE_ZONES};
use crate::guard::implicit::ImplicitCommand;
use crate::guard::patterns::{CommandType, SosCategory};
use crate::guard::policy::{GuardDecision, Verdict};
use crate::guard::RulesFirstGuard;
use crate::intent::{DeviceAction, Intent};
use crate::llm::{IntentContext, IntentEngine, DEFAULT_CLARIFY_PROMPT};
use crate::pipeline::messages::{EmotionSnapshot, Location};
use crate::pipeline::trace::PipelineTrace;
use audit::{AuditLog, AuditRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One inbound triage request.
#[derive(Debug, Clone, Deserialize)]
pub struct TriageRequest {
    pub text: String,
    #[serde(default)]
    pub emotion: Option<EmotionSnapshot>,
    #[serde(default)]
    pub location: Option<Location>,
    /// Set on resubmission after a `need_confirm` answer.
    #[serde(default)]
    pub confirmed: bool,
}

impl TriageRequest {
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            emotion: None,
            location: None,
            confirmed: false,
        }
    }
}

/// Closed response status set of the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    EmergencyDispatched,
    NeedConfirm,
    Denied,
    Canceled,
    Error,
}

/// The wire response of a triage request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl TriageResponse {
    fn status(status: ResponseStatus) -> Self {
        Self {
            status,
            adapter: None,
            result: None,
            intent: None,
            prompt: None,
            reason: None,
            code: None,
        }
    }

    #[must_use]
    pub fn error(code: &str, reason: &str) -> Self {
        Self {
            code: Some(code.to_owned()),
            reason: Some(reason.to_owned()),
            ..Self::status(ResponseStatus::Error)
        }
    }
}

/// Response plus the stage trace; the trace stays out of the wire body.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub response: TriageResponse,
    pub trace: PipelineTrace,
}

struct RunResult {
    response: TriageResponse,
    trace: PipelineTrace,
    adapter_echo: Option<serde_json::Value>,
    dispatch_error: Option<String>,
}

/// The canonical entry point of the triage core.
pub struct Orchestrator {
    guard: RulesFirstGuard,
    geofence: GeofenceMonitor,
    context: ConversationContext,
    intent_engine: Arc<dyn IntentEngine>,
    adapters: AdapterSet,
    audit: AuditLog,
    config: OrchestratorConfig,
    available_devices: Vec<String>,
    inflight: Mutex<Vec<(u64, CancellationToken)>>,
    next_request_id: AtomicU64,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        guard_config: &GuardConfig,
        config: OrchestratorConfig,
        intent_engine: Arc<dyn IntentEngine>,
        adapters: AdapterSet,
        audit: AuditLog,
    ) -> Self {
        let mut available_devices: Vec<String> = guard_config
            .zones
            .iter()
            .map(|zone| format!("{}_light", zone.id))
            .collect();
        available_devices.push("hvac".to_owned());

        Self {
            guard: RulesFirstGuard::new(guard_config),
            geofence: GeofenceMonitor::new(&guard_config.zones),
            context: ConversationContext::new(config.context_window),
            intent_engine,
            adapters,
            audit,
            config,
            available_devices,
            inflight: Mutex::new(Vec::new()),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// The geofence monitor, for zone reload signals.
    #[must_use]
    pub fn geofence(&self) -> &GeofenceMonitor {
        &self.geofence
    }

    /// Text-stage Guard check (`/guard/check`, `type: "asr"`).
    #[must_use]
    pub fn guard_check_text(&self, text: &str) -> GuardDecision {
        self.guard.check_text(text)
    }

    /// Intent-stage Guard check (`/guard/check`, `type: "intent"`).
    #[must_use]
    pub fn guard_check_intent(&self, intent: &Intent) -> GuardDecision {
        self.guard.check_intent(intent)
    }

    /// Handle one request with a fresh cancellation scope.
    pub async fn handle_request(&self, request: TriageRequest) -> PipelineOutcome {
        self.handle_cancellable(request, CancellationToken::new())
            .await
    }

    /// Handle one request under the given cancellation token.
    ///
    /// Cancellation between stages stops further work, records
    /// `canceled` in the trace, and abandons in-flight adapter calls.
    pub async fn handle_cancellable(
        &self,
        request: TriageRequest,
        token: CancellationToken,
    ) -> PipelineOutcome {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.register_inflight(request_id, token.clone());

        let deadline = self.config.max_total_latency_ms;
        let run = self.run(&request, &token, request_id);
        let result = match tokio::time::timeout(
            std::time::Duration::from_millis(deadline),
            run,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => RunResult {
                response: TriageResponse::error("deadline_exceeded", "request took too long"),
                trace: PipelineTrace::new(),
                adapter_echo: None,
                dispatch_error: None,
            },
        };

        self.unregister_inflight(request_id);

        let record = AuditRecord {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            text: request.text.clone(),
            status: result.response.status,
            trace: result.trace.clone(),
            adapter_echo: result.adapter_echo,
            dispatch_error: result.dispatch_error,
        };
        if let Err(e) = self.audit.append(record) {
            warn!(error = %e, "audit append failed");
        }

        PipelineOutcome {
            response: result.response,
            trace: result.trace,
        }
    }

    fn register_inflight(&self, id: u64, token: CancellationToken) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.push((id, token));
        }
    }

    fn unregister_inflight(&self, id: u64) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.retain(|(other, _)| *other != id);
        }
    }

    /// Cancel every other in-flight request; an emergency supersedes
    /// whatever was being processed.
    fn cancel_other_inflight(&self, own_id: u64) {
        let Ok(inflight) = self.inflight.lock() else {
            return;
        };
        for (id, token) in inflight.iter() {
            if *id != own_id {
                token.cancel();
            }
        }
    }

    async fn run(
        &self,
        request: &TriageRequest,
        token: &CancellationToken,
        request_id: u64,
    ) -> RunResult {
        let mut trace = PipelineTrace::new();

        // ---- preprocess -------------------------------------------------
        let stage = Instant::now();
        let emotion = request.emotion.unwrap_or_default();
        // Boost snapshot excludes the entry for the current utterance.
        let recent_topics = self.context.recent_topics(3);
        trace.record("preprocess", stage.elapsed());

        // ---- rules_check ------------------------------------------------
        let stage = Instant::now();
        let geofence = request
            .location
            .map(|loc| self.geofence.assess(loc, "normal"));
        let assessment = self
            .guard
            .assess_speech(&request.text, &emotion, &recent_topics);
        trace.record("rules_check", stage.elapsed());

        let topic = assessment
            .implicit
            .as_ref()
            .map(|cmd| cmd.command_type.as_str())
            .unwrap_or("general");
        self.context.push(ContextEntry {
            text: request.text.clone(),
            emotion: emotion.primary_emotion,
            topic: topic.to_owned(),
            timestamp: Utc::now(),
        });

        // ---- emergency bypass -------------------------------------------
        let geo_emergency = geofence
            .as_ref()
            .map(|g| g.status == GeofenceStatus::Emergency)
            .unwrap_or(false);
        if assessment.is_emergency() || geo_emergency {
            self.cancel_other_inflight(request_id);

            let reason = assessment
                .sos
                .as_ref()
                .map(|hit| sos_reason(hit.category))
                .unwrap_or("geofence_emergency");
            return self.dispatch_emergency(trace, "emergency_bypass", reason, None)
                .await;
        }

        // ---- candidate intent -------------------------------------------
        let zone = geofence
            .as_ref()
            .filter(|g| g.zone_id != OUTSIDE_SAFE_ZONES)
            .map(|g| g.zone_id.clone());

        let candidate = assessment.direct.clone().or_else(|| {
            assessment
                .implicit
                .as_ref()
                .and_then(|cmd| implicit_to_intent(cmd, zone.as_deref(), &emotion))
        });

        let intent = match candidate {
            Some(intent) => {
                trace.record("rules_execute", std::time::Duration::ZERO);
                intent
            }
            None => {
                let stage = Instant::now();
                let context = IntentContext {
                    available_devices: self.available_devices.clone(),
                    location_zone: zone.clone(),
                    recent_topics,
                };
                let parsed = tokio::select! {
                    () = token.cancelled() => {
                        trace.record("canceled", stage.elapsed());
                        return RunResult {
                            response: TriageResponse {
                                reason: Some("llm_parse".to_owned()),
                                ..TriageResponse::status(ResponseStatus::Canceled)
                            },
                            trace,
                            adapter_echo: None,
                            dispatch_error: None,
                        };
                    }
                    intent = self.intent_engine.parse_intent(&request.text, &context) => intent,
                };
                trace.record("llm_parse", stage.elapsed());
                parsed
            }
        };

        // Clarifications and parse failures short-circuit before policy.
        if let Intent::Clarify {
            need,
            clarify_prompt,
            ..
        } = &intent
        {
            let reason = if need.is_empty() {
                "clarification".to_owned()
            } else {
                need.clone()
            };
            return RunResult {
                response: TriageResponse {
                    prompt: Some(clarify_prompt.clone()),
                    reason: Some(reason),
                    ..TriageResponse::status(ResponseStatus::NeedConfirm)
                },
                trace,
                adapter_echo: None,
                dispatch_error: None,
            };
        }
        if intent == Intent::Unknown {
            return RunResult {
                response: TriageResponse {
                    prompt: Some(DEFAULT_CLARIFY_PROMPT.to_owned()),
                    reason: Some("parse_failure".to_owned()),
                    ..TriageResponse::status(ResponseStatus::NeedConfirm)
                },
                trace,
                adapter_echo: None,
                dispatch_error: None,
            };
        }

        // ---- post_guard --------------------------------------------------
        let stage = Instant::now();
        let mut decision = self.guard.check_intent(&intent);
        if request.confirmed && decision.verdict == Verdict::NeedConfirm {
            decision.verdict = Verdict::Allow;
        }
        trace.record("post_guard", stage.elapsed());

        match decision.verdict {
            Verdict::NeedConfirm => RunResult {
                response: TriageResponse {
                    intent: Some(intent),
                    prompt: decision.prompt,
                    reason: decision.reason,
                    ..TriageResponse::status(ResponseStatus::NeedConfirm)
                },
                trace,
                adapter_echo: None,
                dispatch_error: None,
            },
            Verdict::Deny => RunResult {
                response: TriageResponse {
                    reason: decision.reason,
                    ..TriageResponse::status(ResponseStatus::Denied)
                },
                trace,
                adapter_echo: None,
                dispatch_error: None,
            },
            Verdict::DispatchEmergency => {
                let callee = match &intent {
                    Intent::CallEmergency { callee, .. } if !callee.is_empty() => {
                        Some(callee.clone())
                    }
                    _ => None,
                };
                self.dispatch_emergency(trace, "post_guard_dispatch", "policy", callee)
                    .await
            }
            Verdict::Allow | Verdict::PassText | Verdict::Wake => {
                self.execute(intent, trace, token).await
            }
        }
    }

    /// Place the emergency call. Attempted exactly once; a SIP failure
    /// still reports `emergency_dispatched` and lands in the audit
    /// record instead.
    async fn dispatch_emergency(
        &self,
        mut trace: PipelineTrace,
        stage_name: &'static str,
        reason: &str,
        callee: Option<String>,
    ) -> RunResult {
        let stage = Instant::now();
        let callee = callee.unwrap_or_else(|| self.config.bypass_callee.clone());
        info!(callee = callee.as_str(), reason, "dispatching emergency call");

        let (adapter_echo, dispatch_error) = match self.adapters.sip.dial(&callee, reason).await {
            Ok(receipt) => (serde_json::to_value(&receipt).ok(), None),
            Err(e) => {
                error!(error = %e, "emergency dispatch failed");
                (None, Some(e.to_string()))
            }
        };
        trace.record(stage_name, stage.elapsed());

        RunResult {
            response: TriageResponse {
                adapter: Some("sip".to_owned()),
                reason: Some(reason.to_owned()),
                ..TriageResponse::status(ResponseStatus::EmergencyDispatched)
            },
            trace,
            adapter_echo,
            dispatch_error,
        }
    }

    async fn execute(
        &self,
        intent: Intent,
        mut trace: PipelineTrace,
        token: &CancellationToken,
    ) -> RunResult {
        enum ExecOutcome {
            Done(Option<&'static str>, crate::error::Result<serde_json::Value>),
            Canceled,
        }

        let stage = Instant::now();
        let outcome = match &intent {
            Intent::SmartHome {
                device,
                action,
                room,
                ..
            } => {
                let cmd = SmartHomeCmd {
                    device: device.clone(),
                    action: *action,
                    room: room.clone(),
                };
                let call = self.adapters.smart_home.execute(&cmd);
                tokio::select! {
                    () = token.cancelled() => ExecOutcome::Canceled,
                    result = call => ExecOutcome::Done(
                        Some("smart-home"),
                        result.map(|echo| serde_json::to_value(&echo).unwrap_or_default()),
                    ),
                }
            }
            Intent::SocialChat { content_type, mood } => {
                let call = self.adapters.social.engage(content_type, mood);
                tokio::select! {
                    () = token.cancelled() => ExecOutcome::Canceled,
                    result = call => ExecOutcome::Done(Some("social"), result),
                }
            }
            // Locomotion and everything else without an in-core adapter
            // is acknowledged; execution happens downstream.
            _ => ExecOutcome::Done(None, Ok(serde_json::Value::Null)),
        };

        match outcome {
            ExecOutcome::Canceled => {
                trace.record("canceled", stage.elapsed());
                RunResult {
                    response: TriageResponse {
                        reason: Some("execute".to_owned()),
                        ..TriageResponse::status(ResponseStatus::Canceled)
                    },
                    trace,
                    adapter_echo: None,
                    dispatch_error: None,
                }
            }
            ExecOutcome::Done(adapter, Ok(result)) => {
                trace.record("execute", stage.elapsed());
                let result = adapter.map(|_| result);
                RunResult {
                    response: TriageResponse {
                        adapter: adapter.map(str::to_owned),
                        result: result.clone(),
                        intent: Some(intent),
                        ..TriageResponse::status(ResponseStatus::Ok)
                    },
                    trace,
                    adapter_echo: result,
                    dispatch_error: None,
                }
            }
            ExecOutcome::Done(adapter, Err(e)) => {
                trace.record("execute", stage.elapsed());
                let adapter = adapter.unwrap_or("none");
                warn!(adapter, error = %e, "adapter call failed");
                RunResult {
                    response: TriageResponse {
                        adapter: Some(adapter.to_owned()),
                        ..TriageResponse::error("adapter_error", "adapter call failed")
                    },
                    trace,
                    adapter_echo: None,
                    dispatch_error: None,
                }
            }
        }
    }
}

/// Audit/bypass reason tag for an SOS category.
fn sos_reason(category: SosCategory) -> &'static str {
    match category {
        SosCategory::Explicit => "sos_explicit",
        SosCategory::Medical => "sos_medical",
        SosCategory::Fall => "sos_fall",
        SosCategory::Confusion => "sos_confusion",
        SosCategory::Emotional => "sos_emotional",
    }
}

/// Map an implicit command to a concrete intent.
///
/// Assistance requests stay `None`: they signal that help is wanted but
/// extract no device, so the LLM decides.
fn implicit_to_intent(
    cmd: &ImplicitCommand,
    zone: Option<&str>,
    emotion: &EmotionSnapshot,
) -> Option<Intent> {
    match cmd.command_type {
        CommandType::TemperatureControl => Some(Intent::SmartHome {
            device: "hvac".to_owned(),
            action: DeviceAction::Set,
            room: zone.map(str::to_owned),
            confirm: cmd.requires_confirmation,
        }),
        CommandType::LightingControl => Some(Intent::SmartHome {
            device: zone
                .map(|z| format!("{z}_light"))
                .unwrap_or_else(|| "light".to_owned()),
            action: DeviceAction::On,
            room: zone.map(str::to_owned),
            confirm: cmd.requires_confirmation,
        }),
        CommandType::SocialInteraction => Some(Intent::SocialChat {
            content_type: "conversation".to_owned(),
            mood: if emotion.valence < -0.3 {
                "comforting".to_owned()
            } else {
                "friendly".to_owned()
            },
        }),
        CommandType::AssistanceRequest => None,
    }
}
