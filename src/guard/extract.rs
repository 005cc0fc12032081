//! Direct smart-home command extraction.
//!
//! When the transcript names both a device noun and an on/off verb, the
//! command is executable without the LLM. High-risk devices are never
//! extracted here; they go through the LLM and post-Guard confirmation.

use crate::guard::patterns::{DEVICE_NOUNS, OFF_VERBS, ON_VERBS, ROOM_QUALIFIERS};
use crate::intent::{DeviceAction, Intent};

/// Room used when no qualifier appears in the text.
const DEFAULT_ROOM: &str = "living_room";

/// Rules-based smart-home extractor.
pub struct DirectExtractor {
    high_risk_devices: Vec<String>,
}

impl DirectExtractor {
    #[must_use]
    pub fn new(high_risk_devices: &[String]) -> Self {
        Self {
            high_risk_devices: high_risk_devices.to_vec(),
        }
    }

    /// Extract a `smart.home` intent if the text names a device and verb.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<Intent> {
        let folded = text.to_lowercase();

        let kind = DEVICE_NOUNS
            .iter()
            .find(|(pattern, _)| folded.contains(pattern))
            .map(|(_, kind)| *kind)?;

        let action = if ON_VERBS.iter().any(|v| folded.contains(v)) {
            DeviceAction::On
        } else if OFF_VERBS.iter().any(|v| folded.contains(v)) {
            DeviceAction::Off
        } else {
            return None;
        };

        let room = ROOM_QUALIFIERS
            .iter()
            .find(|(pattern, _)| folded.contains(pattern))
            .map(|(_, room)| *room);

        // Lights are per-room fixtures; HVAC is a single unit.
        let device = match kind {
            "light" => format!("{}_light", room.unwrap_or(DEFAULT_ROOM)),
            other => other.to_owned(),
        };

        if self.high_risk_devices.iter().any(|d| d == &device) {
            return None;
        }

        Some(Intent::SmartHome {
            device,
            action,
            room: room.map(str::to_owned),
            confirm: false,
        })
    }
}
