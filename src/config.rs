//! Configuration types for the triage core.
//!
//! Every section is optional in the TOML file; defaults match the
//! documented canonical values. Unknown enum values are rejected at
//! deserialization.

use crate::error::{CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Inbound audio format.
    pub audio: AudioConfig,
    /// Voice-activity segmentation settings.
    pub vad: VadConfig,
    /// Guard pattern and policy settings.
    pub guard: GuardConfig,
    /// LLM intent engine settings.
    pub llm: LlmConfig,
    /// Orchestrator and adapter settings.
    pub orchestrator: OrchestratorConfig,
    /// HTTP surface settings.
    pub server: ServerConfig,
    /// Audit log settings.
    pub audit: AuditConfig,
}

impl CompanionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a config error if the file cannot be read or parsed, or
    /// if validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CompanionError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            CompanionError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::load`] errors for an explicit path.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a config error when a section is internally inconsistent.
    pub fn validate(&self) -> Result<()> {
        self.vad.validate()?;
        if self.audio.channels == 0 {
            return Err(CompanionError::Config(
                "audio.channels must be at least 1".to_owned(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(CompanionError::Config(
                "audio.sample_rate must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Inbound audio format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the inbound PCM stream in Hz.
    pub sample_rate: u32,
    /// Channel count of the inbound PCM stream (1 = mono).
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Voice-activity segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Analysis window length in milliseconds.
    pub frame_ms: u32,
    /// Hop between windows in milliseconds.
    pub hop_ms: u32,
    /// RMS energy threshold; a frame with RMS at or above it is voiced.
    pub threshold: f32,
    /// Consecutive voiced audio required to open a segment.
    pub min_speech_ms: u32,
    /// Trailing silence that closes a segment.
    pub max_sil_ms: u32,
    /// Hard cap on segment length; longer speech is split.
    pub max_segment_ms: u32,
    /// Resample non-16 kHz input to 16 kHz.
    pub resample_to_16k: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_ms: 20,
            hop_ms: 10,
            threshold: 0.015,
            min_speech_ms: 200,
            max_sil_ms: 300,
            max_segment_ms: 10_000,
            resample_to_16k: true,
        }
    }
}

impl VadConfig {
    /// Check that the frame parameters yield at least one frame for the
    /// speech and silence gates.
    ///
    /// # Errors
    ///
    /// Returns a config error when any derived frame count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.frame_ms == 0 || self.hop_ms == 0 {
            return Err(CompanionError::Config(
                "vad.frame_ms and vad.hop_ms must be positive".to_owned(),
            ));
        }
        if self.min_speech_ms / self.hop_ms == 0 {
            return Err(CompanionError::Config(
                "vad.min_speech_ms must cover at least one hop".to_owned(),
            ));
        }
        if self.max_sil_ms / self.hop_ms == 0 {
            return Err(CompanionError::Config(
                "vad.max_sil_ms must cover at least one hop".to_owned(),
            ));
        }
        if self.max_segment_ms < self.min_speech_ms {
            return Err(CompanionError::Config(
                "vad.max_segment_ms must not be below vad.min_speech_ms".to_owned(),
            ));
        }
        Ok(())
    }
}

/// One circular safe zone in room-frame meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone identifier, e.g. `living_room`.
    pub id: String,
    /// Zone center `[x, y]`.
    pub center: [f32; 2],
    /// Zone radius; the boundary is inclusive.
    pub radius: f32,
}

/// Guard pattern and policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Extra explicit SOS keywords merged into the built-in table.
    pub sos_keywords: Vec<String>,
    /// Extra primary wakewords merged into the built-in table.
    pub wakewords: Vec<String>,
    /// Devices that always require confirmation and are never
    /// rules-extracted.
    pub high_risk_devices: Vec<String>,
    /// Safe zones for the geofence monitor.
    pub zones: Vec<ZoneConfig>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            sos_keywords: Vec::new(),
            wakewords: Vec::new(),
            high_risk_devices: vec![
                "front_door_lock".to_owned(),
                "security_system".to_owned(),
                "payment_system".to_owned(),
            ],
            zones: default_zones(),
        }
    }
}

/// Default safe-zone layout of the reference apartment.
#[must_use]
pub fn default_zones() -> Vec<ZoneConfig> {
    vec![
        ZoneConfig {
            id: "living_room".to_owned(),
            center: [1.0, 1.0],
            radius: 1.5,
        },
        ZoneConfig {
            id: "bedroom".to_owned(),
            center: [2.5, 3.0],
            radius: 1.5,
        },
        ZoneConfig {
            id: "kitchen".to_owned(),
            center: [1.0, -2.0],
            radius: 1.2,
        },
        ZoneConfig {
            id: "bathroom".to_owned(),
            center: [-1.5, 2.0],
            radius: 1.0,
        },
    ]
}

/// Which LLM transport to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackendKind {
    /// OpenAI-compatible chat-completions endpoint.
    #[default]
    Cloud,
    /// llama.cpp-style `/completion` endpoint.
    Edge,
}

/// LLM intent engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Transport selection.
    pub backend: LlmBackendKind,
    /// Endpoint URL.
    pub url: String,
    /// Model identifier sent to the cloud backend.
    pub model: String,
    /// Per-call budget in milliseconds; `None` uses the per-backend
    /// default (1500 ms cloud, 3000 ms edge).
    pub timeout_ms: Option<u64>,
    /// Bearer token for the cloud backend, if required.
    pub api_key: Option<String>,
    /// Path to a system prompt file; `None` uses the built-in prompt.
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendKind::Cloud,
            url: "http://127.0.0.1:8000/v1/chat/completions".to_owned(),
            model: "Qwen/Qwen2.5-3B-Instruct".to_owned(),
            timeout_ms: None,
            api_key: None,
            system_prompt_path: None,
        }
    }
}

impl LlmConfig {
    /// Effective per-call deadline.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        let default_ms = match self.backend {
            LlmBackendKind::Cloud => 1500,
            LlmBackendKind::Edge => 3000,
        };
        Duration::from_millis(self.timeout_ms.unwrap_or(default_ms))
    }
}

/// Orchestrator and adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Callee dialed on the emergency bypass path.
    pub bypass_callee: String,
    /// Upper bound on end-to-end request latency in milliseconds.
    pub max_total_latency_ms: u64,
    /// Smart-home adapter endpoint.
    pub smart_home_url: String,
    /// SIP adapter endpoint.
    pub sip_url: String,
    /// Per-call adapter deadline in milliseconds.
    pub adapter_timeout_ms: u64,
    /// Conversation context window (entries).
    pub context_window: usize,
    /// Normal-lane capacity of the segment queue.
    pub segment_queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bypass_callee: "120".to_owned(),
            max_total_latency_ms: 5_000,
            smart_home_url: "http://127.0.0.1:7000/smart-home/cmd".to_owned(),
            sip_url: "http://127.0.0.1:7000/sip/call".to_owned(),
            adapter_timeout_ms: 5_000,
            context_window: 10,
            segment_queue_capacity: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Effective adapter deadline.
    #[must_use]
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address of the orchestrator HTTP surface.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7000".to_owned(),
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Path of the append-only JSONL audit log.
    pub path: PathBuf,
    /// Store a SHA-256 digest of the input text instead of the text.
    pub hash_text: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("xiaoban_audit.jsonl"),
            hash_text: false,
        }
    }
}
