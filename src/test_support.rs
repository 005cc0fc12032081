//! In-memory fakes for unit and integration tests.
//!
//! Adapters record their calls for assertions; the scripted intent
//! engine answers from a substring table, standing in for the LLM.

use crate::adapters::{
    AdapterSet, DialReceipt, SipAdapter, SmartHomeAdapter, SmartHomeCmd, SmartHomeEcho,
    SocialAdapter,
};
use crate::error::{CompanionError, Result};
use crate::intent::Intent;
use crate::llm::{IntentContext, IntentEngine, DEFAULT_CLARIFY_PROMPT};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Smart-home fake that records every command.
#[derive(Default)]
pub struct RecordingSmartHome {
    pub calls: Mutex<Vec<SmartHomeCmd>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl SmartHomeAdapter for RecordingSmartHome {
    async fn execute(&self, cmd: &SmartHomeCmd) -> Result<SmartHomeEcho> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }
        if self.fail.load(Ordering::Relaxed) {
            return Err(CompanionError::Adapter("smart-home fake down".to_owned()));
        }
        Ok(SmartHomeEcho {
            status: "ok".to_owned(),
            echo: cmd.clone(),
        })
    }
}

/// SIP fake that records every dial.
#[derive(Default)]
pub struct RecordingSip {
    pub calls: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl SipAdapter for RecordingSip {
    async fn dial(&self, callee: &str, reason: &str) -> Result<DialReceipt> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((callee.to_owned(), reason.to_owned()));
        }
        if self.fail.load(Ordering::Relaxed) {
            return Err(CompanionError::Adapter("sip fake down".to_owned()));
        }
        Ok(DialReceipt {
            status: "dialing".to_owned(),
            callee: callee.to_owned(),
        })
    }
}

/// Social fake that records every engagement.
#[derive(Default)]
pub struct RecordingSocial {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SocialAdapter for RecordingSocial {
    async fn engage(&self, content_type: &str, mood: &str) -> Result<serde_json::Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((content_type.to_owned(), mood.to_owned()));
        }
        Ok(serde_json::json!({
            "status": "ok",
            "content_type": content_type,
            "mood": mood,
        }))
    }
}

/// Recording adapter bundle plus handles for assertions.
pub struct FakeAdapters {
    pub set: AdapterSet,
    pub smart_home: Arc<RecordingSmartHome>,
    pub sip: Arc<RecordingSip>,
    pub social: Arc<RecordingSocial>,
}

/// Build a recording adapter set.
#[must_use]
pub fn fake_adapters() -> FakeAdapters {
    let smart_home = Arc::new(RecordingSmartHome::default());
    let sip = Arc::new(RecordingSip::default());
    let social = Arc::new(RecordingSocial::default());
    FakeAdapters {
        set: AdapterSet {
            smart_home: Arc::clone(&smart_home) as Arc<dyn SmartHomeAdapter>,
            sip: Arc::clone(&sip) as Arc<dyn SipAdapter>,
            social: Arc::clone(&social) as Arc<dyn SocialAdapter>,
        },
        smart_home,
        sip,
        social,
    }
}

/// Intent engine fake answering from a substring table.
///
/// The first rule whose needle occurs in the text wins; without a match
/// the engine clarifies, mirroring the production fallback.
#[derive(Default)]
pub struct ScriptedIntentEngine {
    rules: Vec<(String, Intent)>,
    delay: Option<Duration>,
}

impl ScriptedIntentEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a substring → intent rule.
    #[must_use]
    pub fn on(mut self, needle: &str, intent: Intent) -> Self {
        self.rules.push((needle.to_owned(), intent));
        self
    }

    /// Delay every answer, for cancellation tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl IntentEngine for ScriptedIntentEngine {
    async fn parse_intent(&self, text: &str, _context: &IntentContext) -> Intent {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, intent)| intent.clone())
            .unwrap_or_else(|| {
                Intent::clarify("intent_type", &["intent_type"], DEFAULT_CLARIFY_PROMPT)
            })
    }
}
