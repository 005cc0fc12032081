//! Implicit-command recognition.
//!
//! Maps stated discomfort ("I'm cold", "it's too dark in here") to a
//! device command class, reinforced by conversation context and the
//! speaker's emotional state.

use crate::guard::patterns::{implicit_patterns, CommandType, COMMAND_PRIORITY};
use crate::pipeline::messages::EmotionSnapshot;
use serde::Serialize;

/// Confidence floor; commands at or below it are not emitted.
const EMIT_THRESHOLD: f32 = 0.6;

/// Confidence below which execution requires confirmation.
const CONFIRM_THRESHOLD: f32 = 0.8;

/// A recognized implicit command.
#[derive(Debug, Clone, Serialize)]
pub struct ImplicitCommand {
    /// The inferred command class.
    pub command_type: CommandType,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether execution should be confirmed with the user first.
    pub requires_confirmation: bool,
}

/// Implicit-command recognizer.
#[derive(Default)]
pub struct ImplicitRecognizer;

impl ImplicitRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Recognize an implicit command in `text`.
    ///
    /// `recent_topics` are the topics of the last few context entries;
    /// each entry mentioning a command type adds 0.1 to that type's
    /// confidence. Emission requires confidence strictly above 0.6; when
    /// several types qualify the most confident wins, ties resolved in
    /// table order.
    #[must_use]
    pub fn recognize(
        &self,
        text: &str,
        emotion: &EmotionSnapshot,
        recent_topics: &[String],
    ) -> Option<ImplicitCommand> {
        let folded = text.to_lowercase();
        let mut best: Option<ImplicitCommand> = None;

        for command in COMMAND_PRIORITY {
            let matches = implicit_patterns(*command)
                .iter()
                .filter(|pattern| folded.contains(*pattern))
                .count();
            if matches == 0 {
                continue;
            }

            let mut confidence = 0.4 + 0.3 * matches as f32;
            confidence += topic_boost(recent_topics, *command);
            if *command == CommandType::SocialInteraction && emotion.valence < -0.3 {
                confidence += 0.2;
            }
            let confidence = confidence.min(1.0);

            if !emits(confidence) {
                continue;
            }
            let better = best
                .as_ref()
                .map(|b| confidence > b.confidence)
                .unwrap_or(true);
            if better {
                best = Some(ImplicitCommand {
                    command_type: *command,
                    confidence,
                    requires_confirmation: confidence < CONFIRM_THRESHOLD,
                });
            }
        }

        best
    }
}

/// Emission gate: strictly above the floor.
fn emits(confidence: f32) -> bool {
    confidence > EMIT_THRESHOLD
}

/// Context reinforcement: 0.1 per recent topic mentioning the command.
#[must_use]
pub fn topic_boost(recent_topics: &[String], command: CommandType) -> f32 {
    let mentions = recent_topics
        .iter()
        .filter(|topic| topic.contains(command.as_str()))
        .count();
    0.1 * mentions as f32
}
