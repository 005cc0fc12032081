//! Rules-first Guard: wakeword, SOS, implicit commands, direct
//! extraction, geofencing, and policy post-validation.
//!
//! The Guard runs before any LLM call and decides whether a transcript
//! is an emergency, an executable command, or needs the intent engine.

pub mod extract;
pub mod geofence;
pub mod implicit;
pub mod patterns;
pub mod policy;
pub mod sos;
pub mod wakeword;

use crate::config::GuardConfig;
use crate::intent::Intent;
use crate::pipeline::messages::EmotionSnapshot;
use extract::DirectExtractor;
use implicit::{ImplicitCommand, ImplicitRecognizer};
use policy::{GuardDecision, PolicyValidator, RiskLevel, Verdict};
use sos::{SosDetector, SosHit};
use wakeword::{WakewordDetector, WakewordHit};

/// Urgency at or above which the orchestrator bypasses the LLM.
pub const BYPASS_URGENCY: u8 = 3;

/// All rules-stage detections for one transcript.
#[derive(Debug)]
pub struct SpeechAssessment {
    pub wakeword: Option<WakewordHit>,
    pub sos: Option<SosHit>,
    pub implicit: Option<ImplicitCommand>,
    /// Rules-extracted smart-home intent, when the text is explicit
    /// enough to skip the LLM.
    pub direct: Option<Intent>,
}

impl SpeechAssessment {
    /// Whether the SOS detection crosses the bypass line.
    #[must_use]
    pub fn is_emergency(&self) -> bool {
        self.sos
            .as_ref()
            .map(|hit| hit.urgency >= BYPASS_URGENCY)
            .unwrap_or(false)
    }
}

/// The composed rules engine.
pub struct RulesFirstGuard {
    wakeword: WakewordDetector,
    sos: SosDetector,
    implicit: ImplicitRecognizer,
    extractor: DirectExtractor,
    policy: PolicyValidator,
}

impl RulesFirstGuard {
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            wakeword: WakewordDetector::new(&config.wakewords),
            sos: SosDetector::new(&config.sos_keywords),
            implicit: ImplicitRecognizer::new(),
            extractor: DirectExtractor::new(&config.high_risk_devices),
            policy: PolicyValidator::new(&config.high_risk_devices),
        }
    }

    /// Run all speech-stage detections on one transcript.
    #[must_use]
    pub fn assess_speech(
        &self,
        text: &str,
        emotion: &EmotionSnapshot,
        recent_topics: &[String],
    ) -> SpeechAssessment {
        SpeechAssessment {
            wakeword: self.wakeword.detect(text, emotion),
            sos: self.sos.detect(text, emotion),
            implicit: self.implicit.recognize(text, emotion, recent_topics),
            direct: self.extractor.extract(text),
        }
    }

    /// Text-stage check for `/guard/check` (`type: "asr"`).
    ///
    /// No emotion stream is available at this surface, so detection runs
    /// with the neutral default snapshot.
    #[must_use]
    pub fn check_text(&self, text: &str) -> GuardDecision {
        let emotion = EmotionSnapshot::default();
        if let Some(hit) = self.sos.detect(text, &emotion) {
            if hit.urgency >= BYPASS_URGENCY {
                return GuardDecision {
                    verdict: Verdict::DispatchEmergency,
                    risk_level: RiskLevel::High,
                    reason: Some("sos_keyword".to_owned()),
                    prompt: None,
                    route: Some(vec![
                        "sip".to_owned(),
                        "family".to_owned(),
                        "doctor".to_owned(),
                    ]),
                };
            }
        }
        if self.wakeword.detect(text, &emotion).is_some() {
            return GuardDecision {
                verdict: Verdict::Wake,
                risk_level: RiskLevel::Low,
                reason: Some("wakeword".to_owned()),
                prompt: None,
                route: None,
            };
        }
        GuardDecision {
            verdict: Verdict::PassText,
            risk_level: RiskLevel::Low,
            reason: None,
            prompt: None,
            route: None,
        }
    }

    /// Intent-stage check for `/guard/check` (`type: "intent"`) and the
    /// orchestrator's post-Guard step.
    #[must_use]
    pub fn check_intent(&self, intent: &Intent) -> GuardDecision {
        self.policy.validate(intent)
    }
}
