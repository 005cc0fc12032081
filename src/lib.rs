//! Xiaoban: speech triage and action dispatch core for an
//! elderly-companion assistant.
//!
//! A continuous audio feed becomes one of four outcomes per utterance,
//! inside a hard latency budget:
//!
//! - an **emergency** is raised and help is dialed (no LLM on this path)
//! - a rules-extractable **command** is executed against an adapter
//! - an ambiguous utterance is parsed by the **LLM intent engine**, then
//!   policy-checked before execution
//! - the user is asked to **clarify**, or the action is denied
//!
//! # Architecture
//!
//! Audio-rate work (capture, segmentation) runs on dedicated threads
//! connected by bounded channels; triage and adapter I/O run on tokio.
//! External collaborators — ASR, smart-home, SIP, social, the LLM — are
//! capability traits injected at startup.

pub mod adapters;
pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod test_support;
pub mod workers;

pub use config::CompanionConfig;
pub use error::{CompanionError, Result};
pub use intent::Intent;
pub use orchestrator::{Orchestrator, PipelineOutcome, TriageRequest, TriageResponse};
