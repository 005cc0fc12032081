//! End-to-end triage scenarios over the orchestrator with in-memory
//! fakes for the adapters and the intent engine.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use xiaoban::config::{CompanionConfig, GuardConfig, OrchestratorConfig};
use xiaoban::intent::{DeviceAction, Intent};
use xiaoban::llm::IntentEngine;
use xiaoban::orchestrator::audit::AuditLog;
use xiaoban::orchestrator::{Orchestrator, PipelineOutcome, ResponseStatus, TriageRequest};
use xiaoban::pipeline::messages::{Emotion, EmotionSnapshot, Location};
use xiaoban::test_support::{fake_adapters, FakeAdapters, ScriptedIntentEngine};

struct Harness {
    orchestrator: Arc<Orchestrator>,
    adapters: FakeAdapters,
    audit_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn scripted_engine() -> ScriptedIntentEngine {
    ScriptedIntentEngine::new()
        .on(
            "门锁",
            Intent::LockUnlock {
                target: "front_door".to_owned(),
            },
        )
        .on(
            "老歌",
            Intent::SocialChat {
                content_type: "music".to_owned(),
                mood: "nostalgic".to_owned(),
            },
        )
        .on(
            "快一点",
            Intent::AssistMove {
                target: "door".to_owned(),
                speed: "fast".to_owned(),
            },
        )
        .on(
            "女儿",
            Intent::CallEmergency {
                callee: "family".to_owned(),
                reason: "user_request".to_owned(),
                confirm: true,
            },
        )
}

fn harness_with_engine(engine: Arc<dyn IntentEngine>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let audit = AuditLog::open_path(&audit_path, false).unwrap();
    let adapters = fake_adapters();
    let config = CompanionConfig::default();
    let orchestrator = Orchestrator::new(
        &config.guard,
        config.orchestrator,
        engine,
        adapters.set.clone(),
        audit,
    );
    Harness {
        orchestrator: Arc::new(orchestrator),
        adapters,
        audit_path,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with_engine(Arc::new(scripted_engine()))
}

fn request(text: &str, stress: f32, location: (f32, f32)) -> TriageRequest {
    TriageRequest {
        text: text.to_owned(),
        emotion: Some(EmotionSnapshot {
            stress,
            ..EmotionSnapshot::default()
        }),
        location: Some(Location::new(location.0, location.1)),
        confirmed: false,
    }
}

async fn run(h: &Harness, req: TriageRequest) -> PipelineOutcome {
    h.orchestrator.handle_request(req).await
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_1_direct_light_command() {
    let h = harness();
    let outcome = run(&h, request("小伴，请帮我开客厅的灯", 0.2, (1.0, 1.0))).await;

    assert_eq!(outcome.response.status, ResponseStatus::Ok);
    assert_eq!(outcome.response.adapter.as_deref(), Some("smart-home"));
    assert!(outcome.trace.contains("rules_execute"));
    assert!(!outcome.trace.contains("llm_parse"));

    let calls = h.adapters.smart_home.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].device, "living_room_light");
    assert_eq!(calls[0].action, DeviceAction::On);
}

#[tokio::test]
async fn scenario_2_emergency_bypass() {
    let h = harness();
    let mut req = request("救命！我心脏很疼", 0.95, (2.5, 3.0));
    req.emotion = Some(EmotionSnapshot {
        primary_emotion: Emotion::Pain,
        stress: 0.95,
        ..EmotionSnapshot::default()
    });
    let outcome = run(&h, req).await;

    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);
    assert!(outcome.trace.contains("emergency_bypass"));
    assert!(!outcome.trace.contains("llm_parse"));

    let calls = h.adapters.sip.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "120");
    assert_eq!(calls[0].1, "sos_explicit");
}

#[tokio::test]
async fn scenario_3_implicit_lighting_outside_zone() {
    let h = harness();
    let outcome = run(&h, request("这里太暗了，看不清楚", 0.3, (-0.5, -0.5))).await;

    assert_eq!(outcome.response.status, ResponseStatus::Ok);
    assert_eq!(outcome.response.adapter.as_deref(), Some("smart-home"));
    match outcome.response.intent.unwrap() {
        Intent::SmartHome {
            device, confirm, ..
        } => {
            // Outside every safe zone: no room prefix to borrow.
            assert_eq!(device, "light");
            assert!(confirm, "single-pattern match must keep confirm=true");
        }
        other => panic!("unexpected intent: {other:?}"),
    }
    assert!(!outcome.trace.contains("llm_parse"));
}

#[tokio::test]
async fn scenario_4_front_door_lock_needs_confirmation() {
    let h = harness();
    let outcome = run(&h, request("请帮我打开前门锁", 0.2, (0.0, -1.5))).await;

    assert_eq!(outcome.response.status, ResponseStatus::NeedConfirm);
    assert!(outcome.response.prompt.unwrap().contains("确认开锁"));
    assert!(outcome.trace.contains("llm_parse"));
    assert!(outcome.trace.contains("post_guard"));
    assert!(h.adapters.smart_home.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_5_vague_request_clarifies() {
    let h = harness();
    let outcome = run(&h, request("我要调节一下", 0.3, (1.0, 1.0))).await;

    assert_eq!(outcome.response.status, ResponseStatus::NeedConfirm);
    assert_eq!(
        outcome.response.prompt.as_deref(),
        Some("请问您需要我帮您做什么？")
    );
    assert!(outcome.trace.contains("llm_parse"));
}

#[tokio::test]
async fn scenario_6_social_chat_via_llm() {
    let h = harness();
    let outcome = run(&h, request("我想听一些怀旧的老歌", 0.3, (0.0, 0.0))).await;

    assert_eq!(outcome.response.status, ResponseStatus::Ok);
    assert_eq!(outcome.response.adapter.as_deref(), Some("social"));
    assert!(outcome.trace.contains("llm_parse"));

    let calls = h.adapters.social.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "music");
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn medical_keyword_always_dispatches_regardless_of_emotion() {
    let h = harness();
    // Calm voice, neutral emotion — the keyword alone must dispatch.
    let outcome = run(&h, request("我胸痛", 0.0, (1.0, 1.0))).await;
    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);
    assert!(outcome.trace.contains("emergency_bypass"));
}

#[tokio::test]
async fn chest_pain_alone_dispatches_without_explicit_cry() {
    let h = harness();
    // No 救命, no other trigger word: the pain complaint itself is the
    // medical SOS signal.
    let outcome = run(&h, request("我心脏很疼", 0.2, (2.5, 3.0))).await;
    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);
    assert!(outcome.trace.contains("emergency_bypass"));
    assert!(!outcome.trace.contains("llm_parse"));

    let calls = h.adapters.sip.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "120");
    assert_eq!(calls[0].1, "sos_medical");
}

#[tokio::test]
async fn explicit_keyword_dispatches_without_location_or_llm() {
    // An engine that would hang forever proves the bypass path never
    // touches the LLM.
    let engine = ScriptedIntentEngine::new().with_delay(Duration::from_secs(60));
    let h = harness_with_engine(Arc::new(engine));
    let req = TriageRequest::text("救命");
    let outcome = run(&h, req).await;
    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);
    assert!(!outcome.trace.contains("llm_parse"));
}

#[tokio::test]
async fn lock_unlock_is_exactly_need_confirm() {
    let h = harness();
    let outcome = run(&h, TriageRequest::text("请帮我打开前门锁")).await;
    assert_eq!(outcome.response.status, ResponseStatus::NeedConfirm);
}

#[tokio::test]
async fn fast_assist_move_is_exactly_denied() {
    let h = harness();
    let outcome = run(&h, TriageRequest::text("快一点带我过去")).await;
    assert_eq!(outcome.response.status, ResponseStatus::Denied);
    assert_eq!(outcome.response.reason.as_deref(), Some("speed_policy"));
}

#[tokio::test]
async fn triage_is_idempotent_without_confirmation() {
    let h = harness();
    let first = run(&h, TriageRequest::text("请帮我打开前门锁")).await;
    let second = run(&h, TriageRequest::text("请帮我打开前门锁")).await;
    let first_bytes = serde_json::to_vec(&first.response).unwrap();
    let second_bytes = serde_json::to_vec(&second.response).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn confirmed_resubmission_executes() {
    let h = harness();
    let mut req = TriageRequest::text("请帮我打开前门锁");
    req.confirmed = true;
    let outcome = run(&h, req).await;
    assert_eq!(outcome.response.status, ResponseStatus::Ok);
    match outcome.response.intent.unwrap() {
        Intent::LockUnlock { target } => assert_eq!(target, "front_door"),
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn llm_call_emergency_goes_through_dispatch() {
    let h = harness();
    let outcome = run(&h, TriageRequest::text("帮我联系一下我女儿")).await;
    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);
    let calls = h.adapters.sip.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "family");
}

#[tokio::test]
async fn sip_failure_still_reports_dispatched() {
    let h = harness();
    h.adapters.sip.fail.store(true, Ordering::Relaxed);
    let outcome = run(&h, TriageRequest::text("救命")).await;
    assert_eq!(outcome.response.status, ResponseStatus::EmergencyDispatched);

    let raw = std::fs::read_to_string(&h.audit_path).unwrap();
    let record: serde_json::Value = serde_json::from_str(raw.lines().last().unwrap()).unwrap();
    assert_eq!(record["status"], "emergency_dispatched");
    assert!(record["dispatch_error"].as_str().unwrap().contains("sip"));
}

#[tokio::test]
async fn adapter_failure_is_a_sanitized_error() {
    let h = harness();
    h.adapters.smart_home.fail.store(true, Ordering::Relaxed);
    let outcome = run(&h, TriageRequest::text("开客厅的灯")).await;
    assert_eq!(outcome.response.status, ResponseStatus::Error);
    assert_eq!(outcome.response.code.as_deref(), Some("adapter_error"));
    assert_eq!(outcome.response.adapter.as_deref(), Some("smart-home"));
    // The fake's internal message must not leak.
    assert_eq!(
        outcome.response.reason.as_deref(),
        Some("adapter call failed")
    );
}

#[tokio::test]
async fn one_audit_record_per_request() {
    let h = harness();
    run(&h, TriageRequest::text("开客厅的灯")).await;
    run(&h, TriageRequest::text("我要调节一下")).await;
    run(&h, TriageRequest::text("救命")).await;

    let raw = std::fs::read_to_string(&h.audit_path).unwrap();
    assert_eq!(raw.lines().count(), 3);
    for line in raw.lines() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(record["trace"].is_array());
        assert!(record["text"].is_string());
    }
}

#[tokio::test]
async fn context_boost_firms_up_repeated_implicit_commands() {
    let h = harness();
    let first = run(&h, TriageRequest::text("有点暗")).await;
    match first.response.intent.unwrap() {
        Intent::SmartHome { confirm, .. } => assert!(confirm),
        other => panic!("unexpected intent: {other:?}"),
    }

    // The previous lighting topic reinforces the repeat to 0.8.
    let second = run(&h, TriageRequest::text("有点暗")).await;
    match second.response.intent.unwrap() {
        Intent::SmartHome { confirm, .. } => assert!(!confirm),
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn new_emergency_cancels_inflight_llm_request() {
    let engine = scripted_engine().with_delay(Duration::from_secs(5));
    let h = harness_with_engine(Arc::new(engine));

    let orchestrator = Arc::clone(&h.orchestrator);
    let slow = tokio::spawn(async move {
        orchestrator
            .handle_request(TriageRequest::text("我想听一些怀旧的老歌"))
            .await
    });

    // Let the slow request reach the LLM stage, then raise an emergency.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let emergency = run(&h, TriageRequest::text("救命")).await;
    assert_eq!(
        emergency.response.status,
        ResponseStatus::EmergencyDispatched
    );

    let slow = slow.await.unwrap();
    assert_eq!(slow.response.status, ResponseStatus::Canceled);
    assert_eq!(slow.response.reason.as_deref(), Some("llm_parse"));
    assert!(slow.trace.contains("canceled"));
}

#[tokio::test]
async fn high_risk_device_from_llm_needs_confirmation() {
    let engine = ScriptedIntentEngine::new().on(
        "安防",
        Intent::SmartHome {
            device: "security_system".to_owned(),
            action: DeviceAction::Off,
            room: None,
            confirm: false,
        },
    );
    let h = harness_with_engine(Arc::new(engine));
    let outcome = run(&h, TriageRequest::text("把安防关掉")).await;
    assert_eq!(outcome.response.status, ResponseStatus::NeedConfirm);
    assert!(outcome
        .response
        .prompt
        .unwrap()
        .contains("security_system"));
}

#[tokio::test]
async fn guard_config_is_respected_end_to_end() {
    // A custom high-risk list turns an ordinary light into a guarded one.
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::open_path(&dir.path().join("audit.jsonl"), false).unwrap();
    let adapters = fake_adapters();
    let guard = GuardConfig {
        high_risk_devices: vec!["living_room_light".to_owned()],
        ..GuardConfig::default()
    };
    let engine = ScriptedIntentEngine::new().on(
        "灯",
        Intent::SmartHome {
            device: "living_room_light".to_owned(),
            action: DeviceAction::On,
            room: None,
            confirm: false,
        },
    );
    let orchestrator = Orchestrator::new(
        &guard,
        OrchestratorConfig::default(),
        Arc::new(engine),
        adapters.set.clone(),
        audit,
    );

    let outcome = orchestrator
        .handle_request(TriageRequest::text("开客厅的灯"))
        .await;
    // Rules refuse to extract a high-risk device; the LLM's answer is
    // then caught by post-Guard.
    assert_eq!(outcome.response.status, ResponseStatus::NeedConfirm);
    assert!(adapters.smart_home.calls.lock().unwrap().is_empty());
}
