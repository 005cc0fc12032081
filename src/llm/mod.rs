//! Structured-LLM intent engine.
//!
//! Turns free text plus conversation context into exactly one [`Intent`]
//! JSON object. Two interchangeable transports (cloud chat-completions
//! and edge `/completion`) sit behind one engine; every failure mode —
//! unreachable backend, timeout, unparsable output — collapses into a
//! `Clarify` so the orchestrator never sees an LLM error.

pub mod cloud;
pub mod edge;
pub mod schema;

use crate::config::{LlmBackendKind, LlmConfig};
use crate::error::{CompanionError, Result};
use crate::intent::Intent;
use async_trait::async_trait;
use cloud::CloudBackend;
use edge::EdgeBackend;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default system prompt (JSON-only contract, zh-CN).
const DEFAULT_SYSTEM_PROMPT: &str = "你是老人陪伴机器人的意图解析器。根据用户的话输出一个 JSON 对象，\
字段 intent 取值：smart.home / call.emergency / social.chat / assist.move / lock.unlock / ask.clarification。\
smart.home 需要 device 和 action(on/off/set)，可选 room 和 confirm；\
call.emergency 需要 callee 和 reason；信息不足时输出 ask.clarification，\
带 need、missing_fields 和 clarify_prompt。只输出 JSON，不要任何解释。";

/// Clarification prompt for malformed LLM output.
pub const FORMAT_CLARIFY_PROMPT: &str = "请再说一遍，或更具体一点";

/// Clarification prompt when the intent itself is unclear or the
/// backend is unavailable.
pub const DEFAULT_CLARIFY_PROMPT: &str = "请问您需要我帮您做什么？";

/// Context handed to the engine alongside the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentContext {
    /// Devices the orchestrator will actually execute against.
    pub available_devices: Vec<String>,
    /// Zone the resident is currently in, if known.
    pub location_zone: Option<String>,
    /// Topics of the recent conversation window.
    pub recent_topics: Vec<String>,
}

/// Capability interface over the intent engine.
#[async_trait]
pub trait IntentEngine: Send + Sync {
    /// Parse one utterance into an intent. Infallible by contract:
    /// failures surface as `Clarify` or `Unknown`.
    async fn parse_intent(&self, text: &str, context: &IntentContext) -> Intent;
}

enum Transport {
    Cloud(CloudBackend),
    Edge(EdgeBackend),
}

/// The production engine over an HTTP transport.
pub struct StructuredIntentEngine {
    transport: Transport,
    system_prompt: String,
}

impl StructuredIntentEngine {
    /// Build from config, loading the system prompt file when set.
    ///
    /// # Errors
    ///
    /// Returns a config error when the prompt file cannot be read, or an
    /// LLM error when the transport cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let system_prompt = match &config.system_prompt_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                CompanionError::Config(format!(
                    "cannot read system prompt {}: {e}",
                    path.display()
                ))
            })?,
            None => DEFAULT_SYSTEM_PROMPT.to_owned(),
        };
        let transport = match config.backend {
            LlmBackendKind::Cloud => Transport::Cloud(CloudBackend::new(config)?),
            LlmBackendKind::Edge => Transport::Edge(EdgeBackend::new(config)?),
        };
        Ok(Self {
            transport,
            system_prompt,
        })
    }

    fn user_prompt(text: &str, context: &IntentContext) -> String {
        // Context rides along as one JSON line so the model can ground
        // device names and the current zone.
        match serde_json::to_string(context) {
            Ok(ctx) => format!("{text}\n上下文: {ctx}"),
            Err(_) => text.to_owned(),
        }
    }
}

#[async_trait]
impl IntentEngine for StructuredIntentEngine {
    async fn parse_intent(&self, text: &str, context: &IntentContext) -> Intent {
        let user = Self::user_prompt(text, context);
        let raw = match &self.transport {
            Transport::Cloud(backend) => backend.complete(&self.system_prompt, &user).await,
            Transport::Edge(backend) => backend.complete(&self.system_prompt, &user).await,
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "intent backend unavailable, returning clarify");
                return Intent::clarify("intent_type", &["intent_type"], DEFAULT_CLARIFY_PROMPT);
            }
        };

        match schema::coerce_intent(&raw) {
            schema::Coercion::Intent(intent) => intent,
            schema::Coercion::UnknownTag(tag) => {
                warn!(tag, "LLM produced an unknown intent tag");
                Intent::Unknown
            }
            schema::Coercion::Malformed => {
                warn!(raw = raw.as_str(), "LLM output failed the schema check");
                Intent::clarify("format", &["format"], FORMAT_CLARIFY_PROMPT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_context() {
        let ctx = IntentContext {
            available_devices: vec!["living_room_light".to_owned()],
            location_zone: Some("living_room".to_owned()),
            recent_topics: vec!["general".to_owned()],
        };
        let prompt = StructuredIntentEngine::user_prompt("开灯", &ctx);
        assert!(prompt.starts_with("开灯"));
        assert!(prompt.contains("living_room_light"));
        assert!(prompt.contains("上下文"));
    }

    #[test]
    fn context_default_is_empty() {
        let ctx = IntentContext::default();
        assert!(ctx.available_devices.is_empty());
        assert!(ctx.location_zone.is_none());
    }
}
