//! Offline segmenter tool: run a WAV file through the stream segmenter
//! and print one metadata line per detected speech segment.
//!
//! Usage: `xiaoban-segment-wav <input.wav> [out_dir]`
//!
//! With `out_dir` set, each segment is also written there as a WAV for
//! listening checks.

use std::path::{Path, PathBuf};

use xiaoban::audio::segmenter::StreamSegmenter;
use xiaoban::config::{AudioConfig, VadConfig};
use xiaoban::pipeline::messages::SpeechSegment;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: xiaoban-segment-wav <input.wav> [out_dir]"))?;
    let out_dir = args.next().map(PathBuf::from);

    let (samples, sample_rate) = read_wav_mono(Path::new(&input))?;

    let audio = AudioConfig {
        sample_rate,
        channels: 1,
    };
    let mut segmenter = StreamSegmenter::new(&audio, &VadConfig::default())?;

    // 100 ms buffers, as the live transport delivers them.
    let chunk = (sample_rate as usize / 10).max(1);
    let mut segments: Vec<SpeechSegment> = Vec::new();
    for buffer in samples.chunks(chunk) {
        segments.extend(segmenter.push_samples(buffer).segments);
    }
    segments.extend(segmenter.flush());

    for (index, segment) in segments.iter().enumerate() {
        println!(
            "{}",
            serde_json::json!({
                "type": "speech_segment",
                "index": index,
                "samples": segment.samples.len(),
                "sr": segment.sample_rate,
                "duration_sec": (segment.duration().as_secs_f64() * 1000.0).round() / 1000.0,
            })
        );
        if let Some(dir) = &out_dir {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("segment_{index:03}.wav"));
            write_wav_mono(&path, &segment.samples, segment.sample_rate)?;
        }
    }

    eprintln!("{} segment(s) detected", segments.len());
    Ok(())
}

/// Load a WAV as mono f32, averaging channels.
fn read_wav_mono(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let mono = if channels > 1 {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };
    Ok((mono, spec.sample_rate))
}

fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
