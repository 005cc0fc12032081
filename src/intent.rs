//! Structured intent produced by the rules engine or the LLM.
//!
//! The wire format is a tagged JSON object whose `intent` field carries
//! one of the canonical dotted tags (`smart.home`, `call.emergency`, …).
//! Unknown tags are handled by the LLM schema check, not by serde.

use serde::{Deserialize, Serialize};

/// Smart-home device action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    On,
    Off,
    Set,
}

/// A structured action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent")]
pub enum Intent {
    /// Operate a smart-home device.
    #[serde(rename = "smart.home")]
    SmartHome {
        device: String,
        action: DeviceAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(default)]
        confirm: bool,
    },

    /// Place an outbound call for help.
    #[serde(rename = "call.emergency")]
    CallEmergency {
        callee: String,
        reason: String,
        #[serde(default)]
        confirm: bool,
    },

    /// Conversational / companionship request.
    #[serde(rename = "social.chat")]
    SocialChat { content_type: String, mood: String },

    /// Ask the robot to move alongside the user.
    #[serde(rename = "assist.move")]
    AssistMove { target: String, speed: String },

    /// Operate a lock.
    #[serde(rename = "lock.unlock")]
    LockUnlock { target: String },

    /// Terminal request for missing information.
    #[serde(rename = "ask.clarification")]
    Clarify {
        #[serde(default)]
        need: String,
        #[serde(default)]
        missing_fields: Vec<String>,
        #[serde(alias = "ask")]
        clarify_prompt: String,
    },

    /// Unrecognized intent tag, coerced by the schema check.
    #[serde(rename = "unknown")]
    Unknown,
}

impl Intent {
    /// The canonical wire tag of this variant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SmartHome { .. } => "smart.home",
            Self::CallEmergency { .. } => "call.emergency",
            Self::SocialChat { .. } => "social.chat",
            Self::AssistMove { .. } => "assist.move",
            Self::LockUnlock { .. } => "lock.unlock",
            Self::Clarify { .. } => "ask.clarification",
            Self::Unknown => "unknown",
        }
    }

    /// Build a clarification intent.
    #[must_use]
    pub fn clarify(need: &str, missing_fields: &[&str], prompt: &str) -> Self {
        Self::Clarify {
            need: need.to_owned(),
            missing_fields: missing_fields.iter().map(|s| (*s).to_owned()).collect(),
            clarify_prompt: prompt.to_owned(),
        }
    }

    /// Whether this is a clarification request.
    #[must_use]
    pub fn is_clarify(&self) -> bool {
        matches!(self, Self::Clarify { .. })
    }
}

/// The canonical intent tags accepted from the LLM.
pub const CANONICAL_TAGS: &[&str] = &[
    "smart.home",
    "call.emergency",
    "social.chat",
    "assist.move",
    "lock.unlock",
    "ask.clarification",
];
