//! Message types passed between pipeline stages.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A chunk of decoded audio samples entering the segmenter.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples at the configured input sample rate.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when this chunk was received.
    pub received_at: Instant,
}

/// A complete speech segment cut out of the stream by the segmenter.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Contiguous audio samples for the entire utterance.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// When the segment started (monotonic).
    pub started_at: Instant,
    /// When the segment ended (monotonic).
    pub ended_at: Instant,
}

impl SpeechSegment {
    /// Audio duration derived from the sample count.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Language tag of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    /// Mandarin Chinese (mainland).
    #[serde(rename = "zh-CN")]
    ZhCn,
    /// US English.
    #[serde(rename = "en-US")]
    EnUs,
}

/// A transcription produced by the external ASR for one speech segment.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// The transcribed text.
    pub text: String,
    /// Language tag of the transcription.
    pub language: Language,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    /// When the source segment started (monotonic).
    pub segment_started_at: Instant,
}

/// Closed set of primary emotions reported by the external analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Fear,
    Pain,
    Anger,
    Frustrated,
    Uncomfortable,
    Lonely,
    Confused,
}

/// Snapshot of the speaker's emotional state for one utterance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionSnapshot {
    /// Dominant emotion.
    pub primary_emotion: Emotion,
    /// Stress level in `[0, 1]`.
    pub stress: f32,
    /// Arousal in `[0, 1]`.
    pub arousal: f32,
    /// Valence in `[-1, 1]`.
    pub valence: f32,
    /// Voice clarity score in `[0, 1]`; low values indicate slurred or
    /// weak elderly speech.
    pub voice_quality: f32,
}

impl Default for EmotionSnapshot {
    fn default() -> Self {
        Self {
            primary_emotion: Emotion::Neutral,
            stress: 0.2,
            arousal: 0.5,
            valence: 0.0,
            voice_quality: 0.8,
        }
    }
}

/// A 2-D position in room-frame meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f32,
    pub y: f32,
}

impl Location {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Location) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Decode a little-endian f32 PCM byte buffer into mono samples.
///
/// Multi-channel input is downmixed by per-frame channel mean. Returns
/// `None` when the byte count is not a whole number of f32 frames — the
/// caller logs and drops such buffers.
#[must_use]
pub fn decode_f32le(bytes: &[u8], channels: u16) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    let channels = channels.max(1) as usize;
    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if channels == 1 {
        return Some(samples);
    }
    if samples.len() % channels != 0 {
        return None;
    }
    let mono = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Some(mono)
}

/// Encode mono f32 samples as little-endian PCM bytes.
///
/// The inverse of [`decode_f32le`] for single-channel audio; the
/// round-trip is bit-exact.
#[must_use]
pub fn encode_f32le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
