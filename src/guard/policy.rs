//! Post-Guard policy validation.
//!
//! Applied to every candidate intent — rules-extracted or LLM-produced —
//! before execution. The tables here are the safety floor: confirmation
//! for locks and high-risk devices, a hard deny for fast assisted motion,
//! and emergency routing for call requests outside the bypass path.

use crate::intent::Intent;
use serde::{Deserialize, Serialize};

/// Prompt spoken when an unlock needs consent.
pub const UNLOCK_PROMPT: &str = "需要打开门锁吗？请说“确认开锁”或“取消”。";

/// Guard verdict on a text or an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    NeedConfirm,
    Deny,
    DispatchEmergency,
    PassText,
    Wake,
}

/// Coarse risk classification attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A Guard decision, as returned by `/guard/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardDecision {
    pub verdict: Verdict,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<String>>,
}

impl GuardDecision {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            risk_level: RiskLevel::Low,
            reason: None,
            prompt: None,
            route: None,
        }
    }
}

/// Policy table over candidate intents.
pub struct PolicyValidator {
    high_risk_devices: Vec<String>,
}

impl PolicyValidator {
    #[must_use]
    pub fn new(high_risk_devices: &[String]) -> Self {
        Self {
            high_risk_devices: high_risk_devices.to_vec(),
        }
    }

    /// Validate a candidate intent against the policy table.
    #[must_use]
    pub fn validate(&self, intent: &Intent) -> GuardDecision {
        match intent {
            Intent::LockUnlock { .. } => GuardDecision {
                verdict: Verdict::NeedConfirm,
                risk_level: RiskLevel::High,
                reason: Some("unlock requires consent".to_owned()),
                prompt: Some(UNLOCK_PROMPT.to_owned()),
                route: None,
            },
            Intent::AssistMove { speed, .. } if speed == "fast" => GuardDecision {
                verdict: Verdict::Deny,
                risk_level: RiskLevel::High,
                reason: Some("speed_policy".to_owned()),
                prompt: None,
                route: None,
            },
            Intent::CallEmergency { .. } => GuardDecision {
                verdict: Verdict::DispatchEmergency,
                risk_level: RiskLevel::High,
                reason: Some("policy".to_owned()),
                prompt: None,
                route: Some(vec![
                    "sip".to_owned(),
                    "family".to_owned(),
                    "doctor".to_owned(),
                ]),
            },
            Intent::SmartHome { device, .. }
                if self.high_risk_devices.iter().any(|d| d == device) =>
            {
                GuardDecision {
                    verdict: Verdict::NeedConfirm,
                    risk_level: RiskLevel::High,
                    reason: Some("high_risk_device".to_owned()),
                    prompt: Some(format!("即将操作高风险设备 {device}，是否确认？")),
                    route: None,
                }
            }
            _ => GuardDecision::allow(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::intent::DeviceAction;

    fn validator() -> PolicyValidator {
        PolicyValidator::new(&["front_door_lock".to_owned(), "security_system".to_owned()])
    }

    #[test]
    fn unlock_requires_consent() {
        let decision = validator().validate(&Intent::LockUnlock {
            target: "front_door".to_owned(),
        });
        assert_eq!(decision.verdict, Verdict::NeedConfirm);
        assert_eq!(decision.risk_level, RiskLevel::High);
        assert!(decision.prompt.unwrap().contains("确认开锁"));
    }

    #[test]
    fn fast_assist_move_denied() {
        let decision = validator().validate(&Intent::AssistMove {
            target: "bedroom".to_owned(),
            speed: "fast".to_owned(),
        });
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.reason.as_deref(), Some("speed_policy"));
    }

    #[test]
    fn slow_assist_move_allowed() {
        let decision = validator().validate(&Intent::AssistMove {
            target: "bedroom".to_owned(),
            speed: "slow".to_owned(),
        });
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[test]
    fn call_emergency_routes_to_dispatch() {
        let decision = validator().validate(&Intent::CallEmergency {
            callee: "family".to_owned(),
            reason: "user_request".to_owned(),
            confirm: true,
        });
        assert_eq!(decision.verdict, Verdict::DispatchEmergency);
        assert_eq!(
            decision.route.unwrap(),
            vec!["sip".to_owned(), "family".to_owned(), "doctor".to_owned()]
        );
    }

    #[test]
    fn high_risk_device_needs_confirmation() {
        let decision = validator().validate(&Intent::SmartHome {
            device: "front_door_lock".to_owned(),
            action: DeviceAction::On,
            room: None,
            confirm: false,
        });
        assert_eq!(decision.verdict, Verdict::NeedConfirm);
        assert!(decision.prompt.unwrap().contains("front_door_lock"));
    }

    #[test]
    fn ordinary_device_allowed() {
        let decision = validator().validate(&Intent::SmartHome {
            device: "living_room_light".to_owned(),
            action: DeviceAction::On,
            room: Some("living_room".to_owned()),
            confirm: false,
        });
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.risk_level, RiskLevel::Low);
    }

    #[test]
    fn social_chat_allowed() {
        let decision = validator().validate(&Intent::SocialChat {
            content_type: "music".to_owned(),
            mood: "calm".to_owned(),
        });
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[test]
    fn verdict_wire_names() {
        let json = serde_json::to_string(&Verdict::NeedConfirm).unwrap();
        assert_eq!(json, "\"need_confirm\"");
        let json = serde_json::to_string(&Verdict::DispatchEmergency).unwrap();
        assert_eq!(json, "\"dispatch_emergency\"");
        assert!(serde_json::from_str::<Verdict>("\"shrug\"").is_err());
    }
}
