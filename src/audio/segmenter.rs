//! Energy-based stream segmenter.
//!
//! Consumes raw f32le PCM buffers and cuts the stream into bounded
//! speech segments: decode → downmix → resample → sliding-window RMS
//! classification → segment state machine. State is confined to the
//! segmenter thread; there is no locking on the audio path.

use crate::audio::resample::RateConverter;
use crate::config::{AudioConfig, VadConfig};
use crate::error::Result;
use crate::pipeline::messages::{decode_f32le, SpeechSegment};
use std::time::Instant;
use tracing::{debug, warn};

/// Output of one segmenter push.
#[derive(Debug, Default)]
pub struct SegmenterOutput {
    /// Decoded/downmixed/resampled samples, for the processed-audio tap.
    pub processed: Vec<f32>,
    /// Segments completed by this push.
    pub segments: Vec<SpeechSegment>,
}

/// Voice-activity segmenter over a continuous PCM stream.
pub struct StreamSegmenter {
    channels: u16,
    converter: RateConverter,
    output_rate: u32,
    threshold: f32,
    frame_len: usize,
    hop_len: usize,
    min_speech_frames: usize,
    max_sil_frames: usize,
    min_speech_samples: usize,
    max_segment_samples: usize,
    /// Unprocessed tail of the sample stream (always shorter than one
    /// window plus one hop).
    residue: Vec<f32>,
    in_speech: bool,
    voice_frames: usize,
    silence_frames: usize,
    speech_buf: Vec<f32>,
    segment_started: Option<Instant>,
}

impl StreamSegmenter {
    /// Create a segmenter for the given stream format and VAD settings.
    ///
    /// # Errors
    ///
    /// Returns a config error when the VAD parameters are inconsistent
    /// or the resampler cannot be initialised.
    pub fn new(audio: &AudioConfig, vad: &VadConfig) -> Result<Self> {
        vad.validate()?;

        let output_rate = if vad.resample_to_16k {
            16_000
        } else {
            audio.sample_rate
        };
        let converter = RateConverter::new(audio.sample_rate, output_rate)?;

        let rate = output_rate as usize;
        let frame_len = (rate * vad.frame_ms as usize / 1000).max(1);
        let hop_len = (rate * vad.hop_ms as usize / 1000).max(1);
        let min_speech_frames = (vad.min_speech_ms / vad.hop_ms).max(1) as usize;
        let max_sil_frames = (vad.max_sil_ms / vad.hop_ms).max(1) as usize;
        let min_speech_samples = rate * vad.min_speech_ms as usize / 1000;
        let max_segment_samples = rate * vad.max_segment_ms as usize / 1000;

        debug!(
            output_rate,
            frame_len,
            hop_len,
            min_speech_frames,
            max_sil_frames,
            threshold = vad.threshold,
            "segmenter ready"
        );

        Ok(Self {
            channels: audio.channels.max(1),
            converter,
            output_rate,
            threshold: vad.threshold,
            frame_len,
            hop_len,
            min_speech_frames,
            max_sil_frames,
            min_speech_samples,
            max_segment_samples,
            residue: Vec::new(),
            in_speech: false,
            voice_frames: 0,
            silence_frames: 0,
            speech_buf: Vec::new(),
            segment_started: None,
        })
    }

    /// Sample rate of emitted segments and processed audio.
    #[must_use]
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Feed one raw PCM byte buffer.
    ///
    /// Malformed buffers (byte count not a whole number of f32 frames)
    /// are logged and dropped; they never fail the stream.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> SegmenterOutput {
        if bytes.is_empty() {
            return SegmenterOutput::default();
        }
        match decode_f32le(bytes, self.channels) {
            Some(samples) => self.push_samples(&samples),
            None => {
                warn!(len = bytes.len(), "malformed PCM buffer dropped");
                SegmenterOutput::default()
            }
        }
    }

    /// Feed decoded mono samples at the configured input rate.
    pub fn push_samples(&mut self, samples: &[f32]) -> SegmenterOutput {
        let processed = self.converter.convert(samples);
        self.residue.extend_from_slice(&processed);
        let segments = self.drain_frames();
        SegmenterOutput {
            processed,
            segments,
        }
    }

    /// Flush: emit the current segment if it is long enough.
    ///
    /// Used at end-of-stream (e.g. by the offline WAV tool); the live
    /// path closes segments on silence instead.
    pub fn flush(&mut self) -> Option<SpeechSegment> {
        if !self.in_speech {
            return None;
        }
        self.in_speech = false;
        self.voice_frames = 0;
        self.silence_frames = 0;
        self.take_segment()
    }

    fn drain_frames(&mut self) -> Vec<SpeechSegment> {
        let mut segments = Vec::new();
        let mut pos = 0;

        while pos + self.frame_len <= self.residue.len() {
            let end = pos + self.frame_len;
            let rms = rms_energy(&self.residue[pos..end]);
            // Inclusive comparison: rms == threshold counts as voiced.
            let voiced = rms >= self.threshold;

            if voiced {
                self.silence_frames = 0;
                if self.in_speech {
                    self.append_window(end, &mut segments);
                } else {
                    self.voice_frames += 1;
                    if self.voice_frames >= self.min_speech_frames {
                        // Idle → Speaking: accumulate from this window on.
                        self.in_speech = true;
                        self.speech_buf.clear();
                        self.speech_buf.extend_from_slice(&self.residue[pos..end]);
                        self.segment_started = Some(Instant::now());
                    }
                }
            } else {
                self.voice_frames = 0;
                if self.in_speech {
                    self.append_window(end, &mut segments);
                    self.silence_frames += 1;
                    if self.silence_frames >= self.max_sil_frames {
                        // Speaking → Idle: close on trailing silence.
                        self.in_speech = false;
                        self.silence_frames = 0;
                        if let Some(segment) = self.take_segment() {
                            segments.push(segment);
                        }
                    }
                }
            }

            pos += self.hop_len;
        }

        self.residue.drain(..pos.min(self.residue.len()));
        segments
    }

    /// Append the newly covered portion of a window to the segment
    /// buffer. Windows overlap by `frame_len - hop_len`, so after the
    /// opening window only the trailing hop is new audio.
    fn append_window(&mut self, end: usize, segments: &mut Vec<SpeechSegment>) {
        let tail = self.hop_len.min(self.frame_len);
        let start = end - tail;
        self.speech_buf.extend_from_slice(&self.residue[start..end]);

        if self.speech_buf.len() >= self.max_segment_samples {
            // Hard cap: emit and keep speaking into a fresh buffer.
            if let Some(segment) = self.take_segment() {
                segments.push(segment);
            }
            self.segment_started = Some(Instant::now());
            self.silence_frames = 0;
        }
    }

    fn take_segment(&mut self) -> Option<SpeechSegment> {
        let started_at = self.segment_started.take().unwrap_or_else(Instant::now);
        let samples = std::mem::take(&mut self.speech_buf);
        if samples.len() < self.min_speech_samples {
            debug!(len = samples.len(), "segment below minimum length, discarded");
            return None;
        }
        Some(SpeechSegment {
            samples,
            sample_rate: self.output_rate,
            started_at,
            ended_at: Instant::now(),
        })
    }
}

/// RMS energy of a frame.
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
