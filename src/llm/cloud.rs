//! OpenAI-compatible chat-completions backend.
//!
//! Works against any server implementing the chat completions API
//! (vLLM, Ollama, llama.cpp server in OpenAI mode, hosted providers).

use crate::config::LlmConfig;
use crate::error::{CompanionError, Result};
use std::time::Duration;
use tracing::debug;

/// Cloud transport for the intent engine.
pub struct CloudBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CloudBackend {
    /// Build from config.
    ///
    /// # Errors
    ///
    /// Returns an LLM error if the HTTP client cannot be constructed.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CompanionError::Llm(format!("http client init: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.effective_timeout(),
        })
    }

    /// One completion call; returns the assistant message content.
    ///
    /// # Errors
    ///
    /// Returns an LLM error on transport failure, timeout, non-success
    /// status, or an unexpected response shape.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.2,
            "max_tokens": 256,
        });

        let mut request = self.client.post(&self.url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CompanionError::Llm(format!("cloud request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Llm(format!("cloud HTTP {status}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompanionError::Llm(format!("cloud response decode: {e}")))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompanionError::Llm("cloud response missing content".to_owned()))?;

        debug!(len = content.len(), "cloud completion received");
        Ok(content.to_owned())
    }
}
