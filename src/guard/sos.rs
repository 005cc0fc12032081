//! SOS keyword detection with emotional escalation.

use crate::guard::patterns::{sos_patterns, SosCategory, SOS_PRIORITY};
use crate::pipeline::messages::{Emotion, EmotionSnapshot};
use serde::Serialize;

/// A detected distress signal.
#[derive(Debug, Clone, Serialize)]
pub struct SosHit {
    /// Highest-priority category that matched.
    pub category: SosCategory,
    /// All matched keywords, across categories.
    pub keywords: Vec<String>,
    /// Urgency in 1..=4; 3 and above triggers the emergency bypass.
    pub urgency: u8,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Substring SOS detector over transcribed text.
pub struct SosDetector {
    /// Extra explicit-category keywords from configuration, pre-folded.
    extra_explicit: Vec<String>,
}

impl SosDetector {
    #[must_use]
    pub fn new(extra_explicit: &[String]) -> Self {
        Self {
            extra_explicit: extra_explicit.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Scan all categories; keywords are combined across categories and
    /// the reported category is the highest-priority one that matched.
    #[must_use]
    pub fn detect(&self, text: &str, emotion: &EmotionSnapshot) -> Option<SosHit> {
        let folded = text.to_lowercase();

        let mut category: Option<SosCategory> = None;
        let mut keywords = Vec::new();

        for cat in SOS_PRIORITY {
            let builtin = sos_patterns(*cat).iter().copied();
            let extra: &[String] = if *cat == SosCategory::Explicit {
                &self.extra_explicit
            } else {
                &[]
            };
            for pattern in builtin.chain(extra.iter().map(String::as_str)) {
                if folded.contains(pattern) {
                    if category.is_none() {
                        category = Some(*cat);
                    }
                    keywords.push(pattern.to_owned());
                }
            }
        }

        let category = category?;

        let mut confidence: f32 = 0.7;
        if emotion.stress > 0.7 {
            confidence += 0.2;
        }
        if matches!(emotion.primary_emotion, Emotion::Fear | Emotion::Pain) {
            confidence += 0.15;
        }

        let mut urgency: u8 = match category {
            SosCategory::Explicit | SosCategory::Medical => 4,
            SosCategory::Fall => 3,
            SosCategory::Confusion | SosCategory::Emotional => 2,
        };
        if emotion.stress > 0.8 {
            urgency += 1;
        }

        Some(SosHit {
            category,
            keywords,
            urgency: urgency.min(4),
            confidence: confidence.min(1.0),
        })
    }
}
