//! llama.cpp-style `/completion` backend for on-device inference.
//!
//! Edge models ramble more than hosted ones, so the request pins
//! temperature to 0 and cuts generation at the first fence, blank line,
//! or end-of-sequence token.

use crate::config::LlmConfig;
use crate::error::{CompanionError, Result};
use std::time::Duration;
use tracing::debug;

/// Generation hard stops for the edge backend.
const STOP_TOKENS: &[&str] = &["```", "\n\n", "</s>"];

/// Instruction suffix keeping small models on the JSON-only rails.
const STRICT_JSON_RULES: &str =
    "\n规则：只能输出一个 JSON 对象，不能输出任何解释或文字；必须以 { 开始，以 } 结束；不要换行/前后缀；不要使用 Markdown；字段不确定就省略。";

/// Edge transport for the intent engine.
pub struct EdgeBackend {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl EdgeBackend {
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
            timeout: config.effective_timeout(),
        })
    }

    /// One completion call; returns the raw generated text.
    ///
    /// # Errors
    ///
    /// Returns an LLM error on transport failure, timeout, non-success
    /// status, or an unexpected response shape.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let strict_system = format!("{system_prompt}{STRICT_JSON_RULES}");
        let body = serde_json::json!({
            "prompt": format!("<<SYS>>{strict_system}<<SYS>>\n{user_prompt}\n"),
            "temperature": 0.0,
            "n_predict": 256,
            "stop": STOP_TOKENS,
            "cache_prompt": true,
        });

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompanionError::Llm(format!("edge request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Llm(format!("edge HTTP {status}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompanionError::Llm(format!("edge response decode: {e}")))?;

        let content = payload["content"]
            .as_str()
            .ok_or_else(|| CompanionError::Llm("edge response missing content".to_owned()))?;

        debug!(len = content.len(), "edge completion received");
        Ok(content.to_owned())
    }
}
