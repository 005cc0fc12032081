//! Intent engine tests against a mock HTTP server: both transports,
//! the schema check, timeouts, and the unreachable-backend fallback.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xiaoban::config::{LlmBackendKind, LlmConfig};
use xiaoban::intent::{DeviceAction, Intent};
use xiaoban::llm::{IntentContext, IntentEngine, StructuredIntentEngine};

fn cloud_config(url: String) -> LlmConfig {
    LlmConfig {
        backend: LlmBackendKind::Cloud,
        url,
        ..LlmConfig::default()
    }
}

fn edge_config(url: String) -> LlmConfig {
    LlmConfig {
        backend: LlmBackendKind::Edge,
        url,
        ..LlmConfig::default()
    }
}

fn chat_completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn cloud_backend_parses_strict_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "temperature": 0.2,
            "max_tokens": 256,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(
            r#"{"intent":"smart.home","device":"living_room_light","action":"on"}"#,
        )))
        .mount(&server)
        .await;

    let engine = StructuredIntentEngine::from_config(&cloud_config(format!(
        "{}/v1/chat/completions",
        server.uri()
    )))
    .unwrap();

    let intent = engine.parse_intent("开客厅的灯", &IntentContext::default()).await;
    match intent {
        Intent::SmartHome { device, action, .. } => {
            assert_eq!(device, "living_room_light");
            assert_eq!(action, DeviceAction::On);
        }
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn cloud_backend_strips_prose_around_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(
            "好的，解析结果如下：{\"intent\":\"social.chat\",\"content_type\":\"conversation\",\"mood\":\"friendly\"} 请确认",
        )))
        .mount(&server)
        .await;

    let engine =
        StructuredIntentEngine::from_config(&cloud_config(server.uri())).unwrap();
    let intent = engine.parse_intent("陪我聊聊天", &IntentContext::default()).await;
    assert_eq!(
        intent,
        Intent::SocialChat {
            content_type: "conversation".to_owned(),
            mood: "friendly".to_owned(),
        }
    );
}

#[tokio::test]
async fn edge_backend_reads_completion_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completion"))
        .and(body_partial_json(serde_json::json!({
            "temperature": 0.0,
            "n_predict": 256,
            "stop": ["```", "\n\n", "</s>"],
            "cache_prompt": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": r#"{"intent":"lock.unlock","target":"front_door"}"#
        })))
        .mount(&server)
        .await;

    let engine = StructuredIntentEngine::from_config(&edge_config(format!(
        "{}/completion",
        server.uri()
    )))
    .unwrap();

    let intent = engine.parse_intent("打开前门锁", &IntentContext::default()).await;
    assert_eq!(
        intent,
        Intent::LockUnlock {
            target: "front_door".to_owned(),
        }
    );
}

#[tokio::test]
async fn malformed_output_becomes_format_clarify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion_body("抱歉，我不太明白您的意思。")),
        )
        .mount(&server)
        .await;

    let engine =
        StructuredIntentEngine::from_config(&cloud_config(server.uri())).unwrap();
    let intent = engine.parse_intent("嗯……", &IntentContext::default()).await;
    match intent {
        Intent::Clarify {
            missing_fields,
            clarify_prompt,
            ..
        } => {
            assert_eq!(missing_fields, vec!["format".to_owned()]);
            assert_eq!(clarify_prompt, "请再说一遍，或更具体一点");
        }
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_tag_becomes_unknown_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(
            r#"{"intent":"order.pizza","size":"large"}"#,
        )))
        .mount(&server)
        .await;

    let engine =
        StructuredIntentEngine::from_config(&cloud_config(server.uri())).unwrap();
    let intent = engine.parse_intent("来个披萨", &IntentContext::default()).await;
    assert_eq!(intent, Intent::Unknown);
}

#[tokio::test]
async fn timeout_becomes_intent_type_clarify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion_body(r#"{"intent":"social.chat","content_type":"a","mood":"b"}"#))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let mut config = cloud_config(server.uri());
    config.timeout_ms = Some(100);
    let engine = StructuredIntentEngine::from_config(&config).unwrap();

    let intent = engine.parse_intent("随便聊聊", &IntentContext::default()).await;
    match intent {
        Intent::Clarify { missing_fields, .. } => {
            assert_eq!(missing_fields, vec!["intent_type".to_owned()]);
        }
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_becomes_clarify() {
    // Nothing listens on this port.
    let config = cloud_config("http://127.0.0.1:9/v1/chat/completions".to_owned());
    let engine = StructuredIntentEngine::from_config(&config).unwrap();
    let intent = engine.parse_intent("开灯", &IntentContext::default()).await;
    match intent {
        Intent::Clarify {
            missing_fields,
            clarify_prompt,
            ..
        } => {
            assert_eq!(missing_fields, vec!["intent_type".to_owned()]);
            assert_eq!(clarify_prompt, "请问您需要我帮您做什么？");
        }
        other => panic!("unexpected intent: {other:?}"),
    }
}

#[tokio::test]
async fn http_error_status_becomes_clarify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine =
        StructuredIntentEngine::from_config(&cloud_config(server.uri())).unwrap();
    let intent = engine.parse_intent("开灯", &IntentContext::default()).await;
    assert!(intent.is_clarify());
}

#[tokio::test]
async fn engine_output_reserializes_to_post_guard_candidate() {
    // Round-trip: raw → intent → JSON → intent is stable.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(
            r#"{"intent":"call.emergency","callee":"family","reason":"user_request","confirm":true}"#,
        )))
        .mount(&server)
        .await;

    let engine =
        StructuredIntentEngine::from_config(&cloud_config(server.uri())).unwrap();
    let intent = engine.parse_intent("联系家人", &IntentContext::default()).await;
    let json = serde_json::to_string(&intent).unwrap();
    let back: Intent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, intent);
}

#[tokio::test]
async fn custom_system_prompt_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let prompt_path = dir.path().join("prompt.txt");
    std::fs::write(&prompt_path, "only emit JSON").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "messages": [{"role": "system", "content": "only emit JSON"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(
            r#"{"intent":"social.chat","content_type":"conversation","mood":"friendly"}"#,
        )))
        .mount(&server)
        .await;

    let mut config = cloud_config(server.uri());
    config.system_prompt_path = Some(prompt_path);
    let engine = StructuredIntentEngine::from_config(&config).unwrap();
    let intent = engine.parse_intent("聊聊", &IntentContext::default()).await;
    assert!(!intent.is_clarify());
}
