//! Polyphase sample-rate conversion for the inbound audio stream.
//!
//! Upstream capture runs at whatever rate the device delivers; the
//! segmenter and everything downstream of it run at 16 kHz. When the
//! rates already match the converter is a passthrough and no rubato
//! session is created.

use crate::error::{CompanionError, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

/// Converts mono f32 audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when input rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input chunks between calls.
    pending: Vec<f32>,
    /// Input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated rubato output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a converter from `input_rate` to `target_rate`.
    ///
    /// # Errors
    ///
    /// Returns an audio error if rubato fails to initialise.
    pub fn new(input_rate: u32, target_rate: u32) -> Result<Self> {
        if input_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size: 0,
                output_buf: Vec::new(),
            });
        }

        // One 10 ms hop of input per rubato call.
        let chunk_size = (input_rate as usize / 100).max(1);
        let ratio = f64::from(target_rate) / f64::from(input_rate);

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            1,
        )
        .map_err(|e| CompanionError::Audio(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        info!(input_rate, target_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            chunk_size,
            output_buf,
        })
    }

    /// Process incoming samples, returning converted output (may be empty).
    ///
    /// Input is accumulated until a full rubato chunk is available; any
    /// remainder is kept for the next call. Passthrough mode returns the
    /// input unchanged.
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let input = &self.pending[..self.chunk_size];
            match resampler.process_into_buffer(&[input], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    out.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }
            self.pending.drain(..self.chunk_size);
        }
        out
    }

    /// `true` when input rate == target rate and no conversion happens.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(16_000, 16_000).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.convert(&samples), samples);
    }

    #[test]
    fn downsample_48k_to_16k_length() {
        let mut rc = RateConverter::new(48_000, 16_000).unwrap();
        assert!(!rc.is_passthrough());
        // 4800 input samples at 48 kHz ≈ 1600 at 16 kHz.
        let out = rc.convert(&vec![0.0f32; 4800]);
        assert!(
            (out.len() as isize - 1600).unsigned_abs() <= 32,
            "output len={}, expected ≈1600",
            out.len()
        );
    }

    #[test]
    fn partial_chunk_is_buffered() {
        let mut rc = RateConverter::new(48_000, 16_000).unwrap();
        // Below one 10 ms chunk (480 samples) — nothing comes out yet.
        assert!(rc.convert(&vec![0.0f32; 200]).is_empty());
        // Topping it up crosses the chunk boundary.
        assert!(!rc.convert(&vec![0.0f32; 400]).is_empty());
    }
}
