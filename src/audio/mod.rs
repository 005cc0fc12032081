//! Inbound audio processing: resampling and voice-activity segmentation.

pub mod resample;
pub mod segmenter;
