//! Wakeword detection with elderly-speech compensation.

use crate::guard::patterns::{wakeword_patterns, WakewordType, WAKEWORD_PRIORITY};
use crate::pipeline::messages::EmotionSnapshot;
use serde::Serialize;

/// A detected wakeword.
#[derive(Debug, Clone, Serialize)]
pub struct WakewordHit {
    /// Class of the wakeword.
    pub wake_type: WakewordType,
    /// The matched pattern.
    pub keyword: String,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Substring wakeword spotter over transcribed text.
pub struct WakewordDetector {
    /// Extra primary wakewords from configuration, pre-folded.
    extra_primary: Vec<String>,
}

impl WakewordDetector {
    #[must_use]
    pub fn new(extra_primary: &[String]) -> Self {
        Self {
            extra_primary: extra_primary.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Scan for a wakeword, emergency class first.
    ///
    /// Confidence starts at 0.8 and is boosted for low voice quality
    /// (slurred elderly speech) and high stress, clamped to 1.0.
    #[must_use]
    pub fn detect(&self, text: &str, emotion: &EmotionSnapshot) -> Option<WakewordHit> {
        let folded = text.to_lowercase();

        for wake_type in WAKEWORD_PRIORITY {
            let builtin = wakeword_patterns(*wake_type).iter().copied();
            let extra: &[String] = if *wake_type == WakewordType::Primary {
                &self.extra_primary
            } else {
                &[]
            };

            let matched = builtin
                .chain(extra.iter().map(String::as_str))
                .find(|pattern| folded.contains(pattern));

            if let Some(keyword) = matched {
                let mut confidence: f32 = 0.8;
                if emotion.voice_quality < 0.7 {
                    confidence += 0.15;
                }
                if emotion.stress > 0.6 {
                    confidence += 0.10;
                }
                return Some(WakewordHit {
                    wake_type: *wake_type,
                    keyword: keyword.to_owned(),
                    confidence: confidence.min(1.0),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::pipeline::messages::Emotion;

    fn detector() -> WakewordDetector {
        WakewordDetector::new(&[])
    }

    #[test]
    fn primary_wakeword_detected() {
        let hit = detector()
            .detect("小伴，请帮我开灯", &EmotionSnapshot::default())
            .unwrap();
        assert_eq!(hit.wake_type, WakewordType::Primary);
        assert_eq!(hit.keyword, "小伴");
        assert!((hit.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn emergency_outranks_primary() {
        // Both 救命 (emergency) and 机器人 (primary) appear.
        let hit = detector()
            .detect("机器人救命", &EmotionSnapshot::default())
            .unwrap();
        assert_eq!(hit.wake_type, WakewordType::Emergency);
        assert_eq!(hit.keyword, "救命");
    }

    #[test]
    fn latin_match_is_case_folded() {
        let hit = detector()
            .detect("Hey ROBOT, lights please", &EmotionSnapshot::default())
            .unwrap();
        assert_eq!(hit.wake_type, WakewordType::Primary);
        assert_eq!(hit.keyword, "robot");
    }

    #[test]
    fn low_voice_quality_boosts_confidence() {
        let emotion = EmotionSnapshot {
            voice_quality: 0.5,
            ..EmotionSnapshot::default()
        };
        let hit = detector().detect("小伴", &emotion).unwrap();
        assert!((hit.confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn stress_boost_clamps_at_one() {
        let emotion = EmotionSnapshot {
            primary_emotion: Emotion::Fear,
            voice_quality: 0.5,
            stress: 0.9,
            ..EmotionSnapshot::default()
        };
        let hit = detector().detect("救命", &emotion).unwrap();
        assert!((hit.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn config_wakewords_extend_primary() {
        let detector = WakewordDetector::new(&["Ayi".to_owned()]);
        let hit = detector
            .detect("ayi 开灯", &EmotionSnapshot::default())
            .unwrap();
        assert_eq!(hit.wake_type, WakewordType::Primary);
        assert_eq!(hit.keyword, "ayi");
    }

    #[test]
    fn no_wakeword_returns_none() {
        assert!(detector()
            .detect("今天天气不错", &EmotionSnapshot::default())
            .is_none());
    }
}
