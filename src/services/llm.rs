//! Content generation through the Anthropic messages API
//!
//! Provides the `ContentGenerator` capability used for:
//! - Prompt enhancement
//! - Website generation
//! - Heatmap-driven website optimization

use crate::config::GeneratorConfig;
use crate::error::{HeatforgeError, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Something that turns a structured prompt into free text
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

/// Failure of one API attempt
struct CallError {
    error: HeatforgeError,
    retryable: bool,
}

impl CallError {
    fn retryable(error: HeatforgeError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: HeatforgeError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

const SYSTEM_PROMPT: &str =
    "You are a skilled web developer who creates beautiful, responsive websites with clean code.";

/// LLM-backed content generator
pub struct LlmService {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl LlmService {
    /// Create a new LLM service from generator settings
    ///
    /// Fails with `GeneratorUnavailable` when no API key is configured.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(HeatforgeError::GeneratorUnavailable(
                "ANTHROPIC_API_KEY not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Delay before retry number `attempt` (0-based), with up to 25% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.config.max_backoff_ms);
        let jitter = if base >= 4 {
            rand::thread_rng().gen_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter).min(self.config.max_backoff_ms))
    }

    /// Call the API with a bounded retry loop
    async fn call_api_with_retry(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;

        loop {
            match self.call_api(prompt).await {
                Ok(text) => return Ok(text),
                Err(CallError { error, retryable }) => {
                    if !retryable || attempt >= self.config.max_retries {
                        return Err(error);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        "Generator call failed, retrying after {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt + 1,
                        self.config.max_retries,
                        error
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Call the API once (no retry)
    async fn call_api(&self, prompt: &str) -> std::result::Result<String, CallError> {
        debug!(
            "Calling Anthropic API: model {}, {} prompt chars",
            self.config.model,
            prompt.len()
        );

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout() || e.is_connect();
                CallError {
                    error: HeatforgeError::Http(e),
                    retryable,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error = HeatforgeError::Generator(format!(
                "API request failed with status {}: {}",
                status, error_text
            ));
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    CallError::fatal(HeatforgeError::GeneratorUnavailable(format!(
                        "API key rejected (status {})",
                        status
                    )))
                }
                StatusCode::TOO_MANY_REQUESTS => CallError::retryable(error),
                s if s.is_server_error() => CallError::retryable(error),
                _ => CallError::fatal(error),
            });
        }

        let api_response: AnthropicResponse = response.json().await.map_err(|e| {
            CallError::fatal(HeatforgeError::Generator(format!(
                "Failed to parse response: {}",
                e
            )))
        })?;

        let text: String = api_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(CallError::fatal(HeatforgeError::Generator(
                "Empty response from API".to_string(),
            )));
        }

        info!("Generator returned {} chars", text.len());
        Ok(text)
    }
}

#[async_trait]
impl ContentGenerator for LlmService {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.call_api_with_retry(prompt).await
    }
}

/// Generator used when no API key is configured
///
/// Every call fails with `GeneratorUnavailable`, so the rest of the system
/// (ingestion, heatmaps, stats, viewing) keeps working without credentials.
#[derive(Debug, Clone, Default)]
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ContentGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(HeatforgeError::GeneratorUnavailable(self.reason.clone()))
    }
}
