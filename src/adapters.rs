//! Action adapter capability interfaces.
//!
//! The orchestrator talks to smart-home, telephony, and social surfaces
//! through these traits. Production wiring uses the HTTP
//! implementations below; tests inject in-memory fakes.

use crate::error::{CompanionError, Result};
use crate::intent::DeviceAction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A smart-home command on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartHomeCmd {
    pub device: String,
    pub action: DeviceAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Echo returned by the smart-home adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartHomeEcho {
    pub status: String,
    pub echo: SmartHomeCmd,
}

/// Receipt returned by the SIP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialReceipt {
    pub status: String,
    pub callee: String,
}

/// Smart-home execution surface.
#[async_trait]
pub trait SmartHomeAdapter: Send + Sync {
    /// Execute one device command.
    ///
    /// # Errors
    ///
    /// Returns an adapter error on transport failure or a rejected
    /// command.
    async fn execute(&self, cmd: &SmartHomeCmd) -> Result<SmartHomeEcho>;
}

/// Outbound telephony surface.
#[async_trait]
pub trait SipAdapter: Send + Sync {
    /// Dial a callee with a short reason tag.
    ///
    /// # Errors
    ///
    /// Returns an adapter error when the call cannot be placed.
    async fn dial(&self, callee: &str, reason: &str) -> Result<DialReceipt>;
}

/// Companionship surface (music, chat, reminiscence content).
#[async_trait]
pub trait SocialAdapter: Send + Sync {
    /// Start a social interaction.
    ///
    /// # Errors
    ///
    /// Returns an adapter error when the channel is unavailable.
    async fn engage(&self, content_type: &str, mood: &str) -> Result<serde_json::Value>;
}

/// The adapter bundle injected into the orchestrator.
#[derive(Clone)]
pub struct AdapterSet {
    pub smart_home: Arc<dyn SmartHomeAdapter>,
    pub sip: Arc<dyn SipAdapter>,
    pub social: Arc<dyn SocialAdapter>,
}

// ---------------------------------------------------------------------------
// HTTP implementations
// ---------------------------------------------------------------------------

/// Smart-home adapter over HTTP.
pub struct HttpSmartHome {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSmartHome {
    /// # Errors
    ///
    /// Returns an adapter error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: url.to_owned(),
            timeout,
        })
    }
}

#[async_trait]
impl SmartHomeAdapter for HttpSmartHome {
    async fn execute(&self, cmd: &SmartHomeCmd) -> Result<SmartHomeEcho> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(cmd)
            .send()
            .await
            .map_err(|e| CompanionError::Adapter(format!("smart-home request: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Adapter(format!("smart-home HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| CompanionError::Adapter(format!("smart-home decode: {e}")))
    }
}

/// SIP adapter over HTTP.
pub struct HttpSip {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSip {
    /// # Errors
    ///
    /// Returns an adapter error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: url.to_owned(),
            timeout,
        })
    }
}

#[async_trait]
impl SipAdapter for HttpSip {
    async fn dial(&self, callee: &str, reason: &str) -> Result<DialReceipt> {
        let body = serde_json::json!({ "callee": callee, "reason": reason });
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompanionError::Adapter(format!("sip request: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Adapter(format!("sip HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| CompanionError::Adapter(format!("sip decode: {e}")))
    }
}

/// Social adapter that answers locally.
///
/// Social content is rendered on the device itself (TTS, music playout),
/// so the default wiring has no remote hop.
pub struct LocalSocial;

#[async_trait]
impl SocialAdapter for LocalSocial {
    async fn engage(&self, content_type: &str, mood: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "status": "ok",
            "channel": "social",
            "content_type": content_type,
            "mood": mood,
        }))
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| CompanionError::Adapter(format!("http client init: {e}")))
}
