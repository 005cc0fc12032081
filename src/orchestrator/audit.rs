//! Append-only JSONL audit log.
//!
//! Exactly one record per triage request, including the pipeline trace
//! and the adapter echo. This is the only durable state the core
//! writes.

use crate::config::AuditConfig;
use crate::error::{CompanionError, Result};
use crate::orchestrator::ResponseStatus;
use crate::pipeline::trace::PipelineTrace;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// One audit record.
#[derive(Debug, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    /// Input text, or its SHA-256 digest when hashing is on.
    pub text: String,
    pub status: ResponseStatus,
    pub trace: PipelineTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_echo: Option<serde_json::Value>,
    /// Present when the emergency dispatch itself failed; the response
    /// still reports `emergency_dispatched`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<String>,
}

/// Append-only audit writer.
pub struct AuditLog {
    file: Mutex<File>,
    hash_text: bool,
}

impl AuditLog {
    /// Open (or create) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O-backed error when the file cannot be opened.
    pub fn open(config: &AuditConfig) -> Result<Self> {
        Self::open_path(&config.path, config.hash_text)
    }

    /// Open a log at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an I/O-backed error when the file cannot be opened.
    pub fn open_path(path: &Path, hash_text: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                CompanionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("audit log {}: {e}", path.display()),
                ))
            })?;
        Ok(Self {
            file: Mutex::new(file),
            hash_text,
        })
    }

    /// Append one record as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an I/O-backed error when the write fails.
    pub fn append(&self, mut record: AuditRecord) -> Result<()> {
        if self.hash_text {
            record.text = sha256_hex(&record.text);
        }
        let line = serde_json::to_string(&record)
            .map_err(|e| CompanionError::Pipeline(format!("audit serialize: {e}")))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| CompanionError::Pipeline("audit log poisoned".to_owned()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}
