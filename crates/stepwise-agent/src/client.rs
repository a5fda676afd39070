//! Language-model client
//!
//! Each step is interpreted by a fresh, stateless request: no conversation
//! history is carried between steps.

use crate::auth;
use crate::circuit_breaker::CircuitBreaker;
use crate::prompt;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, Completion, ModelRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepwise_core::{ModelConfig, Result, StepwiseError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Anything that can answer a [`ModelRequest`] with free text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<Completion>;
}

/// Client for the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    max_retries: u32,
    initial_backoff: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl AgentClient {
    /// Create a client with an explicit API key
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_url: config.api_url.clone(),
            api_key: api_key.into(),
            model: config.name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    /// Create a client reading the key from `config.api_key_env`
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let api_key = auth::get_api_key(&config.api_key_env)?;
        Ok(Self::new(api_key, config))
    }

    /// Override retry count and first backoff for 429/5xx responses
    pub fn with_retry(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Arc::new(circuit_breaker);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

#[async_trait]
impl LanguageModel for AgentClient {
    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        tracing::debug!("Interpreting step with model {}", self.model);

        self.circuit_breaker.guard()?;

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(request.system_context.clone()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt::user_message(request),
            }],
        };

        // Retry loop with exponential backoff for rate limits and server errors
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            tracing::debug!("Sending request to {} (attempt {})", self.api_url, retries + 1);

            let response = match self
                .http
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    return Err(StepwiseError::Api(format!("Failed to send request: {}", e)));
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > self.max_retries {
                    self.circuit_breaker.record_failure();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(StepwiseError::ApiLimit(format!(
                        "Rate limit exceeded after {} retries. Last error: {}",
                        self.max_retries, error_text
                    )));
                }

                // Honor retry-after when present
                let wait = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);

                tracing::warn!(
                    "Rate limited (429). Waiting {:?} before retry {}/{}",
                    wait,
                    retries,
                    self.max_retries
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < self.max_retries {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {:?} before retry {}/{}",
                        status,
                        backoff,
                        retries,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }

                self.circuit_breaker.record_failure();
                tracing::error!(
                    "Circuit breaker: recorded failure (count: {})",
                    self.circuit_breaker.failure_count()
                );

                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(StepwiseError::Auth(format!(
                        "API rejected credentials ({}): {}",
                        status, error_text
                    )));
                }
                return Err(StepwiseError::Api(format!(
                    "API error {}: {}",
                    status, error_text
                )));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| StepwiseError::Api(format!("Failed to parse response: {}", e)))?;

            let text = parsed
                .content
                .iter()
                .filter(|block| block.content_type == "text")
                .map(|block| block.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            if text.trim().is_empty() {
                return Err(StepwiseError::Api("No text content in response".to_string()));
            }

            self.circuit_breaker.record_success();

            if let Some(ref usage) = parsed.usage {
                tracing::debug!(
                    "Model replied ({} chars, {} input tokens, {} output tokens)",
                    text.len(),
                    usage.input_tokens,
                    usage.output_tokens
                );
            }

            return Ok(Completion {
                text,
                timestamp: Utc::now(),
                usage: parsed.usage,
            });
        }
    }
}

/// Scripted language model for testing
///
/// Replies are keyed by step text; unknown steps get the default reply or an
/// API error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: HashMap<String, std::result::Result<String, String>>,
    default_reply: Option<String>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, step_text: &str, reply: &str) -> Self {
        self.replies
            .insert(step_text.to_string(), Ok(reply.to_string()));
        self
    }

    pub fn with_failure(mut self, step_text: &str, message: &str) -> Self {
        self.replies
            .insert(step_text.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_default(mut self, reply: &str) -> Self {
        self.default_reply = Some(reply.to_string());
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match self.replies.get(&request.step_text) {
            Some(Ok(text)) => Ok(Completion::new(text.clone())),
            Some(Err(message)) => Err(StepwiseError::Api(message.clone())),
            None => self
                .default_reply
                .clone()
                .map(Completion::new)
                .ok_or_else(|| {
                    StepwiseError::Api(format!("No scripted reply for: {}", request.step_text))
                }),
        }
    }
}
