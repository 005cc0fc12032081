//! Bounded speech-segment queue between the segmenter and orchestrator.
//!
//! Two lanes: a normal bounded lane with drop-oldest overflow handling,
//! and a priority lane of capacity 1 that bypasses the backlog for
//! segments already classified as emergency traffic. The audio side of
//! the queue never blocks.

use crate::pipeline::messages::SpeechSegment;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::warn;

/// Producer half of the segment queue.
#[derive(Clone)]
pub struct SegmentSender {
    normal_tx: Sender<SpeechSegment>,
    normal_rx: Receiver<SpeechSegment>,
    priority_tx: Sender<SpeechSegment>,
    priority_rx: Receiver<SpeechSegment>,
}

/// Consumer half of the segment queue.
pub struct SegmentReceiver {
    normal_rx: Receiver<SpeechSegment>,
    priority_rx: Receiver<SpeechSegment>,
}

/// Create a segment queue with the given normal-lane capacity.
///
/// Capacity below 1 is clamped to 1. The priority lane always has
/// capacity 1; a new priority segment replaces an unconsumed one.
#[must_use]
pub fn segment_queue(capacity: usize) -> (SegmentSender, SegmentReceiver) {
    let (normal_tx, normal_rx) = bounded(capacity.max(1));
    let (priority_tx, priority_rx) = bounded(1);
    (
        SegmentSender {
            normal_tx,
            normal_rx: normal_rx.clone(),
            priority_tx,
            priority_rx: priority_rx.clone(),
        },
        SegmentReceiver {
            normal_rx,
            priority_rx,
        },
    )
}

impl SegmentSender {
    /// Enqueue a segment on the normal lane.
    ///
    /// When the lane is full the oldest queued segment is dropped to make
    /// room, with a warning.
    pub fn send(&self, segment: SpeechSegment) {
        let mut segment = segment;
        loop {
            match self.normal_tx.try_send(segment) {
                Ok(()) => return,
                Err(crossbeam_channel::TrySendError::Full(seg)) => {
                    if let Ok(dropped) = self.normal_rx.try_recv() {
                        warn!(
                            dropped_ms = dropped.duration().as_millis() as u64,
                            "segment queue full, dropping oldest segment"
                        );
                    }
                    segment = seg;
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                    warn!("segment queue receiver gone, dropping segment");
                    return;
                }
            }
        }
    }

    /// Enqueue a segment on the priority lane, replacing any unconsumed
    /// priority segment.
    pub fn send_priority(&self, segment: SpeechSegment) {
        let mut segment = segment;
        loop {
            match self.priority_tx.try_send(segment) {
                Ok(()) => return,
                Err(crossbeam_channel::TrySendError::Full(seg)) => {
                    let _ = self.priority_rx.try_recv();
                    segment = seg;
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                    warn!("priority lane receiver gone, dropping segment");
                    return;
                }
            }
        }
    }
}

impl SegmentReceiver {
    /// Receive the next segment, preferring the priority lane.
    ///
    /// Blocks until a segment arrives on either lane; returns `None` when
    /// both senders are gone.
    pub fn recv(&self) -> Option<SpeechSegment> {
        if let Ok(seg) = self.priority_rx.try_recv() {
            return Some(seg);
        }
        crossbeam_channel::select! {
            recv(self.priority_rx) -> seg => seg.ok(),
            recv(self.normal_rx) -> seg => seg.ok(),
        }
    }

    /// Non-blocking receive, preferring the priority lane.
    pub fn try_recv(&self) -> Option<SpeechSegment> {
        self.priority_rx
            .try_recv()
            .or_else(|_| self.normal_rx.try_recv())
            .ok()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::time::Instant;

    fn segment(marker: f32) -> SpeechSegment {
        let now = Instant::now();
        SpeechSegment {
            samples: vec![marker; 160],
            sample_rate: 16_000,
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn fifo_within_normal_lane() {
        let (tx, rx) = segment_queue(4);
        tx.send(segment(1.0));
        tx.send(segment(2.0));
        assert_eq!(rx.try_recv().unwrap().samples[0], 1.0);
        assert_eq!(rx.try_recv().unwrap().samples[0], 2.0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let (tx, rx) = segment_queue(2);
        tx.send(segment(1.0));
        tx.send(segment(2.0));
        tx.send(segment(3.0)); // displaces 1.0
        assert_eq!(rx.try_recv().unwrap().samples[0], 2.0);
        assert_eq!(rx.try_recv().unwrap().samples[0], 3.0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn priority_lane_skips_backlog() {
        let (tx, rx) = segment_queue(4);
        tx.send(segment(1.0));
        tx.send(segment(2.0));
        tx.send_priority(segment(9.0));
        assert_eq!(rx.try_recv().unwrap().samples[0], 9.0);
        assert_eq!(rx.try_recv().unwrap().samples[0], 1.0);
    }

    #[test]
    fn priority_lane_replaces_unconsumed() {
        let (tx, rx) = segment_queue(4);
        tx.send_priority(segment(8.0));
        tx.send_priority(segment(9.0));
        assert_eq!(rx.try_recv().unwrap().samples[0], 9.0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn recv_returns_none_when_senders_dropped() {
        let (tx, rx) = segment_queue(1);
        drop(tx);
        assert!(rx.recv().is_none());
    }

    #[test]
    fn capacity_clamped_to_one() {
        let (tx, rx) = segment_queue(0);
        tx.send(segment(1.0));
        tx.send(segment(2.0)); // displaces 1.0 in the single slot
        assert_eq!(rx.try_recv().unwrap().samples[0], 2.0);
    }
}
