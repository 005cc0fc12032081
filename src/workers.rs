//! Long-lived audio workers.
//!
//! Two dedicated OS threads keep the audio path off the async runtime:
//! the capture worker pulls raw PCM buffers from an [`AudioSource`] and
//! never blocks on a slow consumer; the segmenter worker owns the
//! [`StreamSegmenter`] state machine and feeds completed segments into
//! the bounded segment queue.

use crate::audio::segmenter::StreamSegmenter;
use crate::config::{AudioConfig, VadConfig};
use crate::error::Result;
use crate::pipeline::messages::encode_f32le;
use crate::pipeline::queue::{segment_queue, SegmentReceiver, SegmentSender};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Capacity of the raw-buffer channel between capture and segmenter.
const RAW_CHANNEL_CAPACITY: usize = 32;

/// Source of raw PCM byte buffers (the inbound audio topic).
///
/// Pull-based and blocking: `next_buffer` parks until data arrives and
/// returns `None` at end of stream.
pub trait AudioSource: Send {
    fn next_buffer(&mut self) -> Option<Vec<u8>>;
}

/// Segment boundary metadata published on the companion topic.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentMeta {
    /// Always `"speech_segment"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Sample count of the segment.
    pub samples: usize,
    /// Sample rate of the segment.
    pub sr: u32,
    /// Duration in seconds, rounded to milliseconds.
    pub duration_sec: f64,
    /// Unix timestamp of emission.
    pub ts: f64,
}

/// Sink for the processed-audio companion topic.
///
/// Receives every processed frame (for downstream ASR) and, at each
/// segment boundary, the segment metadata plus its PCM bytes.
pub trait ProcessedAudioSink: Send {
    fn publish_frames(&mut self, samples: &[f32], sample_rate: u32);
    fn publish_segment(&mut self, meta: &SegmentMeta, pcm: &[u8]);
}

/// Handles to the running audio workers.
pub struct AudioWorkers {
    pub capture: JoinHandle<()>,
    pub segmenter: JoinHandle<()>,
}

/// Spawn the capture and segmenter workers.
///
/// Returns the consumer half of the segment queue and the thread
/// handles. The workers stop when the source ends.
///
/// # Errors
///
/// Returns a config error when the segmenter cannot be constructed.
pub fn spawn_audio_workers(
    audio: &AudioConfig,
    vad: &VadConfig,
    queue_capacity: usize,
    source: Box<dyn AudioSource>,
    sink: Option<Box<dyn ProcessedAudioSink>>,
) -> Result<(SegmentReceiver, AudioWorkers)> {
    let segmenter = StreamSegmenter::new(audio, vad)?;
    let (segment_tx, segment_rx) = segment_queue(queue_capacity);
    let (raw_tx, raw_rx) = bounded::<Vec<u8>>(RAW_CHANNEL_CAPACITY);

    let capture = std::thread::Builder::new()
        .name("capture".to_owned())
        .spawn(move || capture_loop(source, &raw_tx))
        .map_err(crate::error::CompanionError::Io)?;

    let segmenter_handle = std::thread::Builder::new()
        .name("segmenter".to_owned())
        .spawn(move || segmenter_loop(segmenter, &raw_rx, &segment_tx, sink))
        .map_err(crate::error::CompanionError::Io)?;

    Ok((
        segment_rx,
        AudioWorkers {
            capture,
            segmenter: segmenter_handle,
        },
    ))
}

/// Capture worker: pull buffers at audio rate, never block on the
/// segmenter. A lagging segmenter costs dropped buffers, not latency.
fn capture_loop(mut source: Box<dyn AudioSource>, raw_tx: &Sender<Vec<u8>>) {
    while let Some(buffer) = source.next_buffer() {
        match raw_tx.try_send(buffer) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("segmenter lagging, raw audio buffer dropped");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    info!("audio source ended, capture worker stopping");
}

/// Segmenter worker: single writer over the segmenter state machine.
fn segmenter_loop(
    mut segmenter: StreamSegmenter,
    raw_rx: &Receiver<Vec<u8>>,
    segment_tx: &SegmentSender,
    mut sink: Option<Box<dyn ProcessedAudioSink>>,
) {
    let rate = segmenter.output_rate();
    while let Ok(buffer) = raw_rx.recv() {
        let output = segmenter.push_bytes(&buffer);

        if let Some(sink) = sink.as_mut() {
            if !output.processed.is_empty() {
                sink.publish_frames(&output.processed, rate);
            }
            for segment in &output.segments {
                let meta = SegmentMeta {
                    kind: "speech_segment",
                    samples: segment.samples.len(),
                    sr: segment.sample_rate,
                    duration_sec: (segment.duration().as_secs_f64() * 1000.0).round() / 1000.0,
                    ts: Utc::now().timestamp_millis() as f64 / 1000.0,
                };
                sink.publish_segment(&meta, &encode_f32le(&segment.samples));
            }
        }

        for segment in output.segments {
            segment_tx.send(segment);
        }
    }
    info!("raw channel closed, segmenter worker stopping");
}
